use std::io::{self, BufRead, Write};
use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use tracing_subscriber::EnvFilter;

use skywallet::config::{DEVICE_TYPE_ENV, EMULATOR_ADDR_ENV};
use skywallet::features::DeviceFeatures;
use skywallet::messages::{ButtonRequestType, PinMatrixRequestType};
use skywallet::transport::{UsbBackend, UsbBus, EMULATOR_ADDR};
use skywallet::{
    DeviceType, DomainValue, Driver, InputProvider, Operation, Outcome, Session, TransportConfig,
    TxInput, TxOutput,
};

/// Command line client for the Skycoin hardware wallet and its emulator.
#[derive(Debug, Parser)]
#[command(name = "skywallet-cli", version)]
struct Cli {
    /// USB or EMULATOR
    #[arg(long, global = true, env = DEVICE_TYPE_ENV, default_value_t = DeviceType::Usb)]
    device_type: DeviceType,

    #[arg(long, global = true, env = EMULATOR_ADDR_ENV, default_value_t = EMULATOR_ADDR)]
    emulator_addr: SocketAddr,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More logging, repeat for trace output
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List attached wallets
    List,
    /// Show device features
    Features,
    /// Generate addresses
    AddressGen(AddressGen),
    /// Change device settings
    ApplySettings(ApplySettings),
    /// Set, change or remove the PIN
    SetPinCode(SetPinCode),
    /// Recover a wallet from its seed words
    Recovery(Recovery),
    /// Sign a message with one of the wallet's addresses
    SignMessage(SignMessage),
    /// Check a message signature
    CheckMessageSignature(CheckMessageSignature),
    /// Sign a transaction
    TransactionSign(TransactionSign),
    /// Let the device generate a new seed
    GenerateMnemonic(GenerateMnemonic),
    /// Load a seed onto the device
    SetMnemonic(SetMnemonic),
    /// Back up the seed
    Backup,
    /// Erase the device
    Wipe,
}

#[derive(Debug, Args)]
struct AddressGen {
    /// Number of addresses to generate
    #[arg(long, default_value_t = 1)]
    address_n: u32,
    #[arg(long, default_value_t = 0)]
    start_index: u32,
    /// Show each address on the device screen
    #[arg(long)]
    confirm_address: bool,
}

#[derive(Debug, Args)]
struct ApplySettings {
    #[arg(long)]
    use_passphrase: Option<bool>,
    #[arg(long)]
    label: Option<String>,
    #[arg(long)]
    language: Option<String>,
}

#[derive(Debug, Args)]
struct SetPinCode {
    #[arg(short, long)]
    remove: bool,
}

#[derive(Debug, Args)]
struct Recovery {
    #[arg(long, default_value_t = 12)]
    word_count: u32,
    #[arg(long)]
    use_passphrase: bool,
    /// Only check the words against the stored seed
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct SignMessage {
    #[arg(long, default_value_t = 0)]
    address_n: u32,
    #[arg(long)]
    message: String,
}

#[derive(Debug, Args)]
struct CheckMessageSignature {
    #[arg(long)]
    address: String,
    #[arg(long)]
    message: String,
    #[arg(long)]
    signature: String,
}

#[derive(Debug, Args)]
struct TransactionSign {
    #[arg(long = "input-hash", required = true)]
    input_hashes: Vec<String>,
    #[arg(long = "input-index", required = true)]
    input_indexes: Vec<u32>,
    #[arg(long = "output-address", required = true)]
    output_addresses: Vec<String>,
    #[arg(long = "coin", required = true)]
    coins: Vec<u64>,
    #[arg(long = "hour", required = true)]
    hours: Vec<u64>,
    /// Wallet address index per output, or -1 for foreign addresses
    #[arg(long = "address-index", allow_negative_numbers = true)]
    address_indexes: Vec<i64>,
}

impl TransactionSign {
    fn into_operation(self) -> Result<Operation> {
        if self.input_hashes.len() != self.input_indexes.len() {
            bail!("every --input-hash needs a matching --input-index");
        }
        let n = self.output_addresses.len();
        if self.coins.len() != n || self.hours.len() != n {
            bail!("every --output-address needs a matching --coin and --hour");
        }
        if !self.address_indexes.is_empty() && self.address_indexes.len() != n {
            bail!("--address-index must be given for every output or not at all");
        }

        let inputs = self
            .input_hashes
            .into_iter()
            .zip(self.input_indexes)
            .map(|(hash, index)| TxInput { hash, index })
            .collect();
        let outputs = self
            .output_addresses
            .into_iter()
            .enumerate()
            .map(|(i, address)| TxOutput {
                address,
                coins: self.coins[i],
                hours: self.hours[i],
                address_index: self
                    .address_indexes
                    .get(i)
                    .and_then(|idx| u32::try_from(*idx).ok()),
            })
            .collect();
        Ok(Operation::TransactionSign { inputs, outputs })
    }
}

#[derive(Debug, Args)]
struct GenerateMnemonic {
    #[arg(long, default_value_t = 12)]
    word_count: u32,
    #[arg(long)]
    use_passphrase: bool,
}

#[derive(Debug, Args)]
struct SetMnemonic {
    #[arg(long)]
    mnemonic: String,
}

/// Read one answer line. End of input or a read error declines; an empty
/// line declines too unless `allow_empty` is set.
fn read_answer<R: BufRead>(reader: &mut R, allow_empty: bool) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            let answer = line.trim_end_matches(['\r', '\n']).to_string();
            (allow_empty || !answer.is_empty()).then_some(answer)
        }
    }
}

/// Answers device prompts from the terminal.
struct TerminalInput;

impl TerminalInput {
    fn ask(&mut self, prompt: &str, allow_empty: bool) -> Option<String> {
        eprint!("{}", prompt);
        io::stderr().flush().ok()?;
        read_answer(&mut io::stdin().lock(), allow_empty)
    }
}

impl InputProvider for TerminalInput {
    fn pin(&mut self, kind: PinMatrixRequestType) -> Option<String> {
        let what = match kind {
            PinMatrixRequestType::Current => "current PIN",
            PinMatrixRequestType::NewFirst => "new PIN",
            PinMatrixRequestType::NewSecond => "new PIN again",
        };
        eprintln!("Use the layout shown on the device:");
        eprintln!("  7 8 9\n  4 5 6\n  1 2 3");
        self.ask(&format!("Enter {}: ", what), false)
    }

    fn passphrase(&mut self) -> Option<String> {
        self.ask("Enter passphrase (empty for none): ", true)
    }

    fn word(&mut self) -> Option<String> {
        self.ask("Enter the word shown on the device: ", false)
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn operation_for(command: Command) -> Result<Operation> {
    let op = match command {
        Command::List => bail!("list does not talk to the device"),
        Command::Features => Operation::GetFeatures,
        Command::AddressGen(args) => Operation::AddressGen {
            address_n: args.address_n,
            start_index: args.start_index,
            confirm_address: args.confirm_address,
        },
        Command::ApplySettings(args) => Operation::ApplySettings {
            use_passphrase: args.use_passphrase,
            label: args.label,
            language: args.language,
        },
        Command::SetPinCode(args) => Operation::ChangePin {
            remove: args.remove,
        },
        Command::Recovery(args) => Operation::Recovery {
            word_count: args.word_count,
            use_passphrase: args.use_passphrase,
            dry_run: args.dry_run,
        },
        Command::SignMessage(args) => Operation::SignMessage {
            address_index: args.address_n,
            message: args.message,
        },
        Command::CheckMessageSignature(args) => Operation::CheckMessageSignature {
            address: args.address,
            message: args.message,
            signature: args.signature,
        },
        Command::TransactionSign(args) => args.into_operation()?,
        Command::GenerateMnemonic(args) => Operation::GenerateMnemonic {
            word_count: args.word_count,
            use_passphrase: args.use_passphrase,
        },
        Command::SetMnemonic(args) => Operation::SetMnemonic {
            mnemonic: args.mnemonic,
        },
        Command::Backup => Operation::BackupDevice,
        Command::Wipe => Operation::Wipe,
    };
    Ok(op)
}

fn list_devices(config: &TransportConfig, json: bool) -> Result<()> {
    if config.device_type == DeviceType::Emulator {
        println!("Emulator at {}", config.emulator_addr);
        return Ok(());
    }

    let bus = UsbBus::init().context("Failed to initialize USB")?;
    let devices = bus.enumerate().context("Failed to enumerate USB devices")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }
    if devices.is_empty() {
        println!("No wallet found");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Path", "Backend", "Name", "VID:PID", "Serial"]);
    for dev in &devices {
        table.add_row([
            dev.path.clone(),
            format!("{:?}", dev.backend),
            dev.name.clone(),
            format!("{:04x}:{:04x}", dev.vendor_id, dev.product_id),
            dev.serial_number.clone().unwrap_or_else(|| "<unknown>".to_string()),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn print_list(header: &str, values: &[String]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["#", header]);
    for (i, value) in values.iter().enumerate() {
        table.add_row([i.to_string(), value.clone()]);
    }
    println!("{}", table);
}

fn print_outcome(outcome: &Outcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    match outcome {
        Outcome::Success(text) => println!("{}", text),
        Outcome::Failure(_) => {}
        Outcome::Response(DomainValue::Addresses(addresses)) => print_list("Address", addresses),
        Outcome::Response(DomainValue::Signatures(signatures)) => {
            print_list("Signature", signatures)
        }
        Outcome::Response(DomainValue::SignedMessage(signature)) => println!("{}", signature),
        Outcome::Response(DomainValue::Features(features)) => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(["Feature", "Value"]);
            for (name, value) in DeviceFeatures::from(features).rows() {
                table.add_row([name.to_string(), value]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = TransportConfig {
        device_type: cli.device_type,
        emulator_addr: cli.emulator_addr,
        ..TransportConfig::default()
    };

    if let Command::List = cli.command {
        return list_devices(&config, cli.json);
    }

    let op = operation_for(cli.command)?;
    let driver = Driver::with_config(config);
    let handle = driver
        .get_device()
        .with_context(|| format!("Failed to open {} device", driver.device_type()))?;

    let request = op.request()?;
    eprintln!("Running {} on {} device", op, driver.device_type());
    let mut session = Session::new(handle)
        .on_button(|code| eprintln!("Please {}...", describe_button(code)));
    let outcome = session
        .run(&request, &mut TerminalInput)
        .with_context(|| format!("{} failed", op))?;
    print_outcome(&outcome, cli.json)?;

    if let Outcome::Failure(text) = outcome {
        bail!("Device reported failure: {}", text);
    }
    Ok(())
}

fn describe_button(code: ButtonRequestType) -> &'static str {
    match code {
        ButtonRequestType::Address => "confirm the address on the device",
        ButtonRequestType::SignTx => "confirm the transaction on the device",
        ButtonRequestType::WipeDevice => "confirm the wipe on the device",
        _ => "confirm the action on the device",
    }
}
