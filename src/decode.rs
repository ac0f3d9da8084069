//! Response decoders. Each one refuses a message of the wrong kind before
//! looking at the payload.

use crate::error::DecodeError;
use crate::messages::{
    ButtonRequest, ButtonRequestType, Failure, FailureType, Features, Message, MessageType,
    PinMatrixRequest, PinMatrixRequestType, ResponseSkycoinAddress, ResponseSkycoinSignMessage,
    ResponseTransactionSign, Success,
};

fn decode_as<M>(
    msg: &Message,
    expected: MessageType,
    decoder: &'static str,
) -> Result<M, DecodeError>
where
    M: prost::Message + Default,
{
    if !msg.is(expected) {
        return Err(DecodeError::WrongKind {
            decoder,
            actual: msg.kind,
        });
    }
    Ok(M::decode(msg.data.as_slice())?)
}

pub fn decode_success(msg: &Message) -> Result<String, DecodeError> {
    decode_as::<Success>(msg, MessageType::Success, "decode_success")
        .map(|s| s.message.unwrap_or_default())
}

pub fn decode_failure(msg: &Message) -> Result<String, DecodeError> {
    decode_failure_detail(msg).map(|(_, text)| text)
}

/// Failure text together with the device's failure code, when it sent one.
pub fn decode_failure_detail(
    msg: &Message,
) -> Result<(Option<FailureType>, String), DecodeError> {
    let failure = decode_as::<Failure>(msg, MessageType::Failure, "decode_failure")?;
    let code = failure.code.and_then(FailureType::from_i32);
    Ok((code, failure.message.unwrap_or_default()))
}

/// Text of either a `Success` or a `Failure`.
pub fn decode_success_or_failure(msg: &Message) -> Result<String, DecodeError> {
    match msg.message_type() {
        Some(MessageType::Success) => decode_success(msg),
        Some(MessageType::Failure) => decode_failure(msg),
        _ => Err(DecodeError::WrongKind {
            decoder: "decode_success_or_failure",
            actual: msg.kind,
        }),
    }
}

pub fn decode_addresses(msg: &Message) -> Result<Vec<String>, DecodeError> {
    decode_as::<ResponseSkycoinAddress>(
        msg,
        MessageType::ResponseSkycoinAddress,
        "decode_addresses",
    )
    .map(|r| r.addresses)
}

pub fn decode_transaction_signatures(msg: &Message) -> Result<Vec<String>, DecodeError> {
    decode_as::<ResponseTransactionSign>(
        msg,
        MessageType::ResponseTransactionSign,
        "decode_transaction_signatures",
    )
    .map(|r| r.signatures)
}

pub fn decode_signed_message(msg: &Message) -> Result<String, DecodeError> {
    decode_as::<ResponseSkycoinSignMessage>(
        msg,
        MessageType::ResponseSkycoinSignMessage,
        "decode_signed_message",
    )
    .map(|r| r.signed_message)
}

pub fn decode_features(msg: &Message) -> Result<Features, DecodeError> {
    decode_as(msg, MessageType::Features, "decode_features")
}

pub fn decode_pin_matrix_request(msg: &Message) -> Result<PinMatrixRequestType, DecodeError> {
    let req = decode_as::<PinMatrixRequest>(
        msg,
        MessageType::PinMatrixRequest,
        "decode_pin_matrix_request",
    )?;
    Ok(req
        .r#type
        .and_then(PinMatrixRequestType::from_i32)
        .unwrap_or(PinMatrixRequestType::Current))
}

pub fn decode_button_request(msg: &Message) -> Result<ButtonRequestType, DecodeError> {
    let req = decode_as::<ButtonRequest>(msg, MessageType::ButtonRequest, "decode_button_request")?;
    Ok(req
        .code
        .and_then(ButtonRequestType::from_i32)
        .unwrap_or(ButtonRequestType::Other))
}
