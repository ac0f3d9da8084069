//! The wallet operations a caller can run, validated before anything is sent.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::messages::{Message, SkycoinTransactionInput, SkycoinTransactionOutput};
use crate::requests;

pub const WORD_COUNTS: [u32; 2] = [12, 24];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub hash: String,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub coins: u64,
    pub hours: u64,
    /// Set when the output goes back to one of the wallet's own addresses.
    pub address_index: Option<u32>,
}

impl From<&TxInput> for SkycoinTransactionInput {
    fn from(input: &TxInput) -> Self {
        Self {
            hash_in: input.hash.clone(),
            index: Some(input.index),
        }
    }
}

impl From<&TxOutput> for SkycoinTransactionOutput {
    fn from(output: &TxOutput) -> Self {
        Self {
            address: output.address.clone(),
            coin: output.coins,
            hour: output.hours,
            address_index: output.address_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    Initialize,
    GetFeatures,
    AddressGen {
        address_n: u32,
        start_index: u32,
        confirm_address: bool,
    },
    ApplySettings {
        use_passphrase: Option<bool>,
        label: Option<String>,
        language: Option<String>,
    },
    ChangePin {
        remove: bool,
    },
    Recovery {
        word_count: u32,
        use_passphrase: bool,
        dry_run: bool,
    },
    SignMessage {
        address_index: u32,
        message: String,
    },
    CheckMessageSignature {
        address: String,
        message: String,
        signature: String,
    },
    TransactionSign {
        inputs: Vec<TxInput>,
        outputs: Vec<TxOutput>,
    },
    GenerateMnemonic {
        word_count: u32,
        use_passphrase: bool,
    },
    SetMnemonic {
        mnemonic: String,
    },
    BackupDevice,
    Wipe,
}

fn check_word_count(word_count: u32) -> Result<()> {
    if WORD_COUNTS.contains(&word_count) {
        Ok(())
    } else {
        Err(Error::InvalidParams(format!(
            "word count must be 12 or 24, got {}",
            word_count
        )))
    }
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Initialize => "initialize",
            Operation::GetFeatures => "get_features",
            Operation::AddressGen { .. } => "address_gen",
            Operation::ApplySettings { .. } => "apply_settings",
            Operation::ChangePin { .. } => "change_pin",
            Operation::Recovery { .. } => "recovery",
            Operation::SignMessage { .. } => "sign_message",
            Operation::CheckMessageSignature { .. } => "check_message_signature",
            Operation::TransactionSign { .. } => "transaction_sign",
            Operation::GenerateMnemonic { .. } => "generate_mnemonic",
            Operation::SetMnemonic { .. } => "set_mnemonic",
            Operation::BackupDevice => "backup_device",
            Operation::Wipe => "wipe",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Operation::AddressGen { address_n, .. } if *address_n < 1 => Err(Error::InvalidParams(
                "address_n must be at least 1".to_string(),
            )),
            Operation::Recovery { word_count, .. }
            | Operation::GenerateMnemonic { word_count, .. } => check_word_count(*word_count),
            Operation::SetMnemonic { mnemonic } => {
                let words = mnemonic.split_whitespace().count() as u32;
                check_word_count(words)
            }
            Operation::TransactionSign { inputs, outputs } => {
                if inputs.is_empty() || outputs.is_empty() {
                    return Err(Error::InvalidParams(
                        "a transaction needs at least one input and one output".to_string(),
                    ));
                }
                Ok(())
            }
            Operation::SignMessage { message, .. } if message.is_empty() => {
                Err(Error::InvalidParams("message must not be empty".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Validate and build the opening request.
    pub fn request(&self) -> Result<Message> {
        self.validate()?;
        let msg = match self {
            Operation::Initialize => requests::initialize(),
            Operation::GetFeatures => requests::get_features(),
            Operation::AddressGen {
                address_n,
                start_index,
                confirm_address,
            } => requests::address_gen(*address_n, *start_index, *confirm_address),
            Operation::ApplySettings {
                use_passphrase,
                label,
                language,
            } => requests::apply_settings(*use_passphrase, label.clone(), language.clone()),
            Operation::ChangePin { remove } => requests::change_pin(*remove),
            Operation::Recovery {
                word_count,
                use_passphrase,
                dry_run,
            } => requests::recovery(*word_count, *use_passphrase, *dry_run),
            Operation::SignMessage {
                address_index,
                message,
            } => requests::sign_message(*address_index, message),
            Operation::CheckMessageSignature {
                address,
                message,
                signature,
            } => requests::check_message_signature(address, message, signature),
            Operation::TransactionSign { inputs, outputs } => requests::transaction_sign(
                inputs.iter().map(Into::into).collect(),
                outputs.iter().map(Into::into).collect(),
            ),
            Operation::GenerateMnemonic {
                word_count,
                use_passphrase,
            } => requests::generate_mnemonic(*word_count, *use_passphrase),
            Operation::SetMnemonic { mnemonic } => requests::set_mnemonic(mnemonic),
            Operation::BackupDevice => requests::backup_device(),
            Operation::Wipe => requests::wipe_device(),
        };
        Ok(msg)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageType;

    #[test]
    fn test_address_gen_requires_one_address() {
        let op = Operation::AddressGen {
            address_n: 0,
            start_index: 0,
            confirm_address: false,
        };
        assert!(matches!(op.request(), Err(Error::InvalidParams(_))));

        let op = Operation::AddressGen {
            address_n: 1,
            start_index: 0,
            confirm_address: false,
        };
        assert!(op.request().unwrap().is(MessageType::SkycoinAddress));
    }

    #[test]
    fn test_word_counts() {
        for (count, ok) in [(12, true), (24, true), (18, false), (0, false)] {
            let op = Operation::Recovery {
                word_count: count,
                use_passphrase: false,
                dry_run: true,
            };
            assert_eq!(op.validate().is_ok(), ok, "word count {count}");
        }

        let mnemonic = "cloud flower upset remain green metal below cup stem infant art thank";
        let op = Operation::SetMnemonic {
            mnemonic: mnemonic.into(),
        };
        assert!(op.request().unwrap().is(MessageType::SetMnemonic));
        let op = Operation::SetMnemonic {
            mnemonic: "too short".into(),
        };
        assert!(op.validate().is_err());
    }

    #[test]
    fn test_transaction_needs_inputs_and_outputs() {
        let op = Operation::TransactionSign {
            inputs: vec![],
            outputs: vec![TxOutput {
                address: "2M755W9o7933roLASK9PZTmqRsjQUsVen9y".into(),
                coins: 1,
                hours: 1,
                address_index: None,
            }],
        };
        assert!(matches!(op.validate(), Err(Error::InvalidParams(_))));
    }

    #[test]
    fn test_operation_from_json() {
        let op: Operation = serde_json::from_str(
            r#"{"operation":"address_gen","address_n":2,"start_index":0,"confirm_address":false}"#,
        )
        .unwrap();
        assert_eq!(op.name(), "address_gen");
        assert!(op.request().is_ok());
    }
}
