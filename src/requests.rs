//! Builders for every request the host sends, replies to prompts included.

use crate::messages::*;

pub fn initialize() -> Message {
    Message::from_proto(MessageType::Initialize, &Initialize::default())
}

pub fn get_features() -> Message {
    Message::from_proto(MessageType::GetFeatures, &GetFeatures::default())
}

pub fn address_gen(address_n: u32, start_index: u32, confirm_address: bool) -> Message {
    Message::from_proto(
        MessageType::SkycoinAddress,
        &SkycoinAddress {
            address_n,
            start_index: Some(start_index),
            confirm_address: Some(confirm_address),
        },
    )
}

pub fn apply_settings(
    use_passphrase: Option<bool>,
    label: Option<String>,
    language: Option<String>,
) -> Message {
    Message::from_proto(
        MessageType::ApplySettings,
        &ApplySettings {
            language,
            label,
            use_passphrase,
        },
    )
}

pub fn change_pin(remove: bool) -> Message {
    Message::from_proto(
        MessageType::ChangePin,
        &ChangePin {
            remove: remove.then_some(true),
        },
    )
}

pub fn recovery(word_count: u32, use_passphrase: bool, dry_run: bool) -> Message {
    Message::from_proto(
        MessageType::RecoveryDevice,
        &RecoveryDevice {
            word_count: Some(word_count),
            passphrase_protection: Some(use_passphrase),
            dry_run: Some(dry_run),
            ..RecoveryDevice::default()
        },
    )
}

pub fn sign_message(address_index: u32, message: &str) -> Message {
    Message::from_proto(
        MessageType::SkycoinSignMessage,
        &SkycoinSignMessage {
            address_n: address_index,
            message: message.to_string(),
        },
    )
}

pub fn check_message_signature(address: &str, message: &str, signature: &str) -> Message {
    Message::from_proto(
        MessageType::SkycoinCheckMessageSignature,
        &SkycoinCheckMessageSignature {
            address: address.to_string(),
            message: message.to_string(),
            signature: signature.to_string(),
        },
    )
}

pub fn transaction_sign(
    inputs: Vec<SkycoinTransactionInput>,
    outputs: Vec<SkycoinTransactionOutput>,
) -> Message {
    Message::from_proto(
        MessageType::TransactionSign,
        &TransactionSign {
            nb_in: inputs.len() as u32,
            transaction_in: inputs,
            nb_out: outputs.len() as u32,
            transaction_out: outputs,
        },
    )
}

pub fn generate_mnemonic(word_count: u32, use_passphrase: bool) -> Message {
    Message::from_proto(
        MessageType::GenerateMnemonic,
        &GenerateMnemonic {
            word_count: Some(word_count),
            passphrase_protection: Some(use_passphrase),
        },
    )
}

pub fn set_mnemonic(mnemonic: &str) -> Message {
    Message::from_proto(
        MessageType::SetMnemonic,
        &SetMnemonic {
            mnemonic: mnemonic.to_string(),
        },
    )
}

pub fn backup_device() -> Message {
    Message::from_proto(MessageType::BackupDevice, &BackupDevice::default())
}

pub fn wipe_device() -> Message {
    Message::from_proto(MessageType::WipeDevice, &WipeDevice::default())
}

pub fn pin_matrix_ack(pin: &str) -> Message {
    Message::from_proto(
        MessageType::PinMatrixAck,
        &PinMatrixAck {
            pin: pin.to_string(),
        },
    )
}

pub fn passphrase_ack(passphrase: &str) -> Message {
    Message::from_proto(
        MessageType::PassphraseAck,
        &PassphraseAck {
            passphrase: passphrase.to_string(),
        },
    )
}

pub fn word_ack(word: &str) -> Message {
    Message::from_proto(
        MessageType::WordAck,
        &WordAck {
            word: word.to_string(),
        },
    )
}

pub fn button_ack() -> Message {
    Message::from_proto(MessageType::ButtonAck, &ButtonAck::default())
}

pub fn entropy_ack(entropy: Vec<u8>) -> Message {
    Message::from_proto(
        MessageType::EntropyAck,
        &EntropyAck {
            entropy: Some(entropy),
        },
    )
}

pub fn cancel() -> Message {
    Message::from_proto(MessageType::Cancel, &Cancel::default())
}
