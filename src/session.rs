//! Interactive request/reply state machine.
//!
//! A request may lead to a chain of device prompts before the final answer.
//! Button and entropy requests are acknowledged automatically; PIN,
//! passphrase and recovery words suspend the session until the caller
//! supplies them.

use core::fmt;
use std::time::Duration;

use rand::RngCore;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::decode;
use crate::driver;
use crate::error::{Error, ProtocolError, Result};
use crate::messages::{
    kind_name, ButtonRequestType, Features, Message, MessageType, PinMatrixRequestType,
};
use crate::requests;
use crate::transport::Transport;

const ENTROPY_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TerminalKind {
    Success,
    Failure,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    AwaitingPin,
    AwaitingPassphrase,
    AwaitingWord,
    AwaitingButton,
    Terminal(TerminalKind),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Terminal(kind) => write!(f, "Terminal({:?})", kind),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Typed payload of a terminal response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainValue {
    Addresses(Vec<String>),
    Signatures(Vec<String>),
    SignedMessage(String),
    Features(Features),
}

/// How a session ended. A device `Failure` is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success(String),
    Failure(String),
    Response(DomainValue),
}

impl Outcome {
    pub fn terminal_kind(&self) -> TerminalKind {
        match self {
            Outcome::Success(_) => TerminalKind::Success,
            Outcome::Failure(_) => TerminalKind::Failure,
            Outcome::Response(_) => TerminalKind::Response,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRequest {
    Pin(PinMatrixRequestType),
    Passphrase,
    Word,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Pin(String),
    Passphrase(String),
    Word(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    NeedInput(InputRequest),
    Done(Outcome),
}

/// Answers device prompts for [`Session::run`]. Returning `None` cancels
/// the pending request.
pub trait InputProvider {
    /// `kind` tells which PIN is asked for: current, new or its confirmation.
    fn pin(&mut self, kind: PinMatrixRequestType) -> Option<String>;
    fn passphrase(&mut self) -> Option<String>;
    fn word(&mut self) -> Option<String>;
}

type ButtonObserver = Box<dyn FnMut(ButtonRequestType)>;

/// One interactive exchange over an exclusively owned handle.
pub struct Session<T: Transport> {
    handle: T,
    state: SessionState,
    history: Vec<SessionState>,
    sends: usize,
    /// Read timeout of the opening request; continuation replies wait at least this long.
    read_timeout: Duration,
    on_button: Option<ButtonObserver>,
}

impl<T: Transport> Session<T> {
    pub fn new(handle: T) -> Self {
        Self {
            handle,
            state: SessionState::Idle,
            history: Vec::new(),
            sends: 0,
            read_timeout: Duration::ZERO,
            on_button: None,
        }
    }

    /// Called each time the device waits for a button press.
    pub fn on_button(mut self, observer: impl FnMut(ButtonRequestType) + 'static) -> Self {
        self.on_button = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// States entered so far, in order.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Number of request/reply exchanges performed.
    pub fn sends(&self) -> usize {
        self.sends
    }

    pub fn handle(&self) -> &T {
        &self.handle
    }

    pub fn into_handle(self) -> T {
        self.handle
    }

    #[instrument(level = "info", skip_all, fields(kind = %kind_name(request.kind)))]
    pub fn start(&mut self, request: &Message) -> Result<Step> {
        if self.state != SessionState::Idle {
            return Err(self.invalid("start a request"));
        }
        self.read_timeout = request.read_timeout();
        let reply = self.exchange(request)?;
        self.dispatch(reply)
    }

    pub fn supply_pin(&mut self, pin: &str) -> Result<Step> {
        self.provide(Input::Pin(pin.to_string()))
    }

    pub fn supply_passphrase(&mut self, passphrase: &str) -> Result<Step> {
        self.provide(Input::Passphrase(passphrase.to_string()))
    }

    pub fn supply_word(&mut self, word: &str) -> Result<Step> {
        self.provide(Input::Word(word.to_string()))
    }

    pub fn provide(&mut self, input: Input) -> Result<Step> {
        let (expected, ack, action) = match &input {
            Input::Pin(pin) => (
                SessionState::AwaitingPin,
                requests::pin_matrix_ack(pin),
                "supply a PIN",
            ),
            Input::Passphrase(p) => (
                SessionState::AwaitingPassphrase,
                requests::passphrase_ack(p),
                "supply a passphrase",
            ),
            Input::Word(word) => (
                SessionState::AwaitingWord,
                requests::word_ack(word),
                "supply a word",
            ),
        };
        if self.state != expected {
            return Err(self.invalid(action));
        }
        let reply = self.exchange(&ack)?;
        self.dispatch(reply)
    }

    /// Tell the device to drop the pending request and give the handle back.
    pub fn abort(mut self) -> Result<T> {
        info!("Aborting session in state {}", self.state);
        driver::send_no_reply(&mut self.handle, &requests::cancel())?;
        Ok(self.handle)
    }

    /// Drive `request` to completion, asking `provider` for every prompt.
    #[instrument(level = "info", skip_all, fields(kind = %kind_name(request.kind)))]
    pub fn run<P: InputProvider + ?Sized>(
        &mut self,
        request: &Message,
        provider: &mut P,
    ) -> Result<Outcome> {
        let mut step = self.start(request)?;
        loop {
            let input = match step {
                Step::Done(outcome) => return Ok(outcome),
                Step::NeedInput(InputRequest::Pin(kind)) => provider.pin(kind).map(Input::Pin),
                Step::NeedInput(InputRequest::Passphrase) => {
                    provider.passphrase().map(Input::Passphrase)
                }
                Step::NeedInput(InputRequest::Word) => provider.word().map(Input::Word),
            };
            match input {
                Some(input) => step = self.provide(input)?,
                None => {
                    info!("Input declined in state {}, cancelling", self.state);
                    driver::send_no_reply(&mut self.handle, &requests::cancel())?;
                    return Err(Error::Cancelled);
                }
            }
        }
    }

    fn exchange(&mut self, msg: &Message) -> Result<Message> {
        self.sends += 1;
        let timeout = msg.read_timeout().max(self.read_timeout);
        Ok(driver::send_with_timeout(&mut self.handle, msg, timeout)?)
    }

    fn enter(&mut self, state: SessionState) {
        debug!("Session {} -> {}", self.state, state);
        self.state = state;
        self.history.push(state);
    }

    fn finish(&mut self, outcome: Outcome) -> Step {
        self.enter(SessionState::Terminal(outcome.terminal_kind()));
        Step::Done(outcome)
    }

    fn invalid(&self, action: &'static str) -> Error {
        Error::InvalidState {
            state: self.state.to_string(),
            action,
        }
    }

    fn dispatch(&mut self, mut reply: Message) -> Result<Step> {
        loop {
            let Some(kind) = reply.message_type() else {
                return Err(ProtocolError::UnexpectedMessageKind(reply.kind).into());
            };
            match kind {
                MessageType::PinMatrixRequest => {
                    let pin_kind = decode::decode_pin_matrix_request(&reply)?;
                    self.enter(SessionState::AwaitingPin);
                    return Ok(Step::NeedInput(InputRequest::Pin(pin_kind)));
                }
                MessageType::PassphraseRequest => {
                    self.enter(SessionState::AwaitingPassphrase);
                    return Ok(Step::NeedInput(InputRequest::Passphrase));
                }
                MessageType::WordRequest => {
                    self.enter(SessionState::AwaitingWord);
                    return Ok(Step::NeedInput(InputRequest::Word));
                }
                MessageType::ButtonRequest => {
                    let code = decode::decode_button_request(&reply)?;
                    self.enter(SessionState::AwaitingButton);
                    info!("Waiting for button confirmation ({:?})", code);
                    if let Some(observer) = self.on_button.as_mut() {
                        observer(code);
                    }
                    reply = self.exchange(&requests::button_ack())?;
                }
                MessageType::EntropyRequest => {
                    let mut entropy = vec![0u8; ENTROPY_LEN];
                    rand::thread_rng().fill_bytes(&mut entropy);
                    reply = self.exchange(&requests::entropy_ack(entropy))?;
                }
                MessageType::Success => {
                    let text = decode::decode_success(&reply)?;
                    return Ok(self.finish(Outcome::Success(text)));
                }
                MessageType::Failure => {
                    let text = decode::decode_failure(&reply)?;
                    return Ok(self.finish(Outcome::Failure(text)));
                }
                MessageType::ResponseSkycoinAddress => {
                    let value = DomainValue::Addresses(decode::decode_addresses(&reply)?);
                    return Ok(self.finish(Outcome::Response(value)));
                }
                MessageType::ResponseTransactionSign => {
                    let signatures = decode::decode_transaction_signatures(&reply)?;
                    let value = DomainValue::Signatures(signatures);
                    return Ok(self.finish(Outcome::Response(value)));
                }
                MessageType::ResponseSkycoinSignMessage => {
                    let value = DomainValue::SignedMessage(decode::decode_signed_message(&reply)?);
                    return Ok(self.finish(Outcome::Response(value)));
                }
                MessageType::Features => {
                    let value = DomainValue::Features(decode::decode_features(&reply)?);
                    return Ok(self.finish(Outcome::Response(value)));
                }
                _ => return Err(ProtocolError::UnexpectedMessageKind(reply.kind).into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::messages::*;
    use crate::testing::ScriptedTransport;
    use prost::Message as _;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    fn pin_request(kind: PinMatrixRequestType) -> PinMatrixRequest {
        PinMatrixRequest {
            r#type: Some(kind as i32),
        }
    }

    fn button_request() -> ButtonRequest {
        ButtonRequest {
            code: Some(ButtonRequestType::Address as i32),
            data: None,
        }
    }

    fn success(text: &str) -> Success {
        Success {
            message: Some(text.to_string()),
        }
    }

    fn failure(text: &str) -> Failure {
        Failure {
            code: Some(FailureType::ActionCancelled as i32),
            message: Some(text.to_string()),
        }
    }

    #[derive(Default)]
    struct Scripted {
        pins: VecDeque<String>,
        passphrases: VecDeque<String>,
        words: VecDeque<String>,
        pin_kinds: Vec<PinMatrixRequestType>,
    }

    impl InputProvider for Scripted {
        fn pin(&mut self, kind: PinMatrixRequestType) -> Option<String> {
            self.pin_kinds.push(kind);
            self.pins.pop_front()
        }

        fn passphrase(&mut self) -> Option<String> {
            self.passphrases.pop_front()
        }

        fn word(&mut self) -> Option<String> {
            self.words.pop_front()
        }
    }

    #[test]
    fn test_pin_then_button_then_success() {
        let dev = ScriptedTransport::new()
            .reply(MessageType::PinMatrixRequest, &pin_request(PinMatrixRequestType::Current))
            .reply(MessageType::ButtonRequest, &button_request())
            .reply(MessageType::Success, &success("PIN changed"));
        let mut session = Session::new(dev);

        let step = session.start(&requests::change_pin(false)).unwrap();
        assert_eq!(step, Step::NeedInput(InputRequest::Pin(PinMatrixRequestType::Current)));
        assert_eq!(session.state(), SessionState::AwaitingPin);

        let step = session.supply_pin("1234").unwrap();
        assert_eq!(step, Step::Done(Outcome::Success("PIN changed".into())));
        assert_eq!(session.sends(), 3);
        assert_eq!(
            session.history(),
            &[
                SessionState::AwaitingPin,
                SessionState::AwaitingButton,
                SessionState::Terminal(TerminalKind::Success),
            ]
        );

        let dev = session.into_handle();
        assert_eq!(
            dev.sent_kinds(),
            vec![MessageType::ChangePin, MessageType::PinMatrixAck, MessageType::ButtonAck]
        );
        let sent = dev.sent();
        let ack = PinMatrixAck::decode(sent[1].data.as_slice()).unwrap();
        assert_eq!(ack.pin, "1234");
    }

    #[test]
    fn test_reply_after_pin_waits_as_long_as_the_request() {
        let request = requests::address_gen(10, 0, false);
        let ack_timeout = requests::pin_matrix_ack("1234").read_timeout();
        assert!(request.read_timeout() > ack_timeout);

        let dev = ScriptedTransport::new()
            .reply(MessageType::PinMatrixRequest, &pin_request(PinMatrixRequestType::Current))
            .reply(
                MessageType::ResponseSkycoinAddress,
                &ResponseSkycoinAddress {
                    addresses: vec!["2EU3JbveHdkxW6z5tdhbbB2kRAWvXC2pLzw".into()],
                },
            );
        let mut session = Session::new(dev);
        session.start(&request).unwrap();
        let step = session.supply_pin("1234").unwrap();
        assert!(matches!(step, Step::Done(Outcome::Response(DomainValue::Addresses(_)))));

        let dev = session.into_handle();
        assert_eq!(dev.sent_kinds(), vec![MessageType::SkycoinAddress, MessageType::PinMatrixAck]);
        assert_eq!(dev.read_timeouts, vec![request.read_timeout(); 2]);
    }

    #[test]
    fn test_button_ack_keeps_its_own_longer_timeout() {
        let request = requests::wipe_device();
        let ack = requests::button_ack();
        assert!(ack.read_timeout() > request.read_timeout());

        let dev = ScriptedTransport::new()
            .reply(MessageType::ButtonRequest, &button_request())
            .reply(MessageType::Success, &success("Device wiped"));
        let mut session = Session::new(dev);
        session.start(&request).unwrap();

        let dev = session.into_handle();
        assert_eq!(dev.read_timeouts, vec![request.read_timeout(), ack.read_timeout()]);
    }

    #[test]
    fn test_button_then_failure_is_an_outcome() {
        let dev = ScriptedTransport::new()
            .reply(MessageType::ButtonRequest, &button_request())
            .reply(MessageType::Failure, &failure("declined"));
        let mut session = Session::new(dev);

        let step = session.start(&requests::wipe_device()).unwrap();
        assert_eq!(step, Step::Done(Outcome::Failure("declined".into())));
        assert_eq!(session.sends(), 2);
        assert_eq!(
            session.history(),
            &[SessionState::AwaitingButton, SessionState::Terminal(TerminalKind::Failure)]
        );
    }

    #[test]
    fn test_button_observer_sees_each_request() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let dev = ScriptedTransport::new()
            .reply(MessageType::ButtonRequest, &button_request())
            .reply(MessageType::ButtonRequest, &button_request())
            .reply(
                MessageType::ResponseSkycoinAddress,
                &ResponseSkycoinAddress {
                    addresses: vec!["2EU3JbveHdkxW6z5tdhbbB2kRAWvXC2pLzw".into()],
                },
            );
        let mut session = Session::new(dev).on_button(move |code| log.borrow_mut().push(code));

        let step = session.start(&requests::address_gen(1, 0, true)).unwrap();
        assert_eq!(
            step,
            Step::Done(Outcome::Response(DomainValue::Addresses(vec![
                "2EU3JbveHdkxW6z5tdhbbB2kRAWvXC2pLzw".into()
            ])))
        );
        assert_eq!(*seen.borrow(), vec![ButtonRequestType::Address; 2]);
        assert_eq!(session.sends(), 3);
    }

    #[test]
    fn test_entropy_request_is_answered_automatically() {
        let dev = ScriptedTransport::new()
            .reply(MessageType::EntropyRequest, &EntropyRequest::default())
            .reply(MessageType::Success, &success("Mnemonic successfully configured"));
        let mut session = Session::new(dev);

        let step = session.start(&requests::generate_mnemonic(12, false)).unwrap();
        assert_eq!(step, Step::Done(Outcome::Success("Mnemonic successfully configured".into())));
        assert_eq!(session.history(), &[SessionState::Terminal(TerminalKind::Success)]);

        let sent = session.into_handle().sent();
        assert!(sent[1].is(MessageType::EntropyAck));
        let ack = EntropyAck::decode(sent[1].data.as_slice()).unwrap();
        assert_eq!(ack.entropy.map(|e| e.len()), Some(32));
    }

    #[test]
    fn test_unexpected_reply_kind() {
        let dev = ScriptedTransport::new()
            .reply_raw(MessageType::Entropy as u16, &[])
            .reply_raw(999, &[]);
        let mut session = Session::new(dev);
        match session.start(&requests::initialize()) {
            Err(Error::Protocol(ProtocolError::UnexpectedMessageKind(kind))) => {
                assert_eq!(kind, MessageType::Entropy as u16)
            }
            other => panic!("expected UnexpectedMessageKind, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_reply_is_a_decode_error() {
        let dev = ScriptedTransport::new().reply_raw(MessageType::Success as u16, &[0xff]);
        let mut session = Session::new(dev);
        assert!(matches!(
            session.start(&requests::initialize()),
            Err(Error::Decode(DecodeError::MalformedPayload(_)))
        ));
    }

    #[test]
    fn test_wrong_input_kind_is_rejected_without_sending() {
        let dev = ScriptedTransport::new()
            .reply(MessageType::PinMatrixRequest, &pin_request(PinMatrixRequestType::Current));
        let mut session = Session::new(dev);
        session.start(&requests::sign_message(1, "hello")).unwrap();

        assert!(matches!(
            session.supply_word("abandon"),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(
            session.start(&requests::initialize()),
            Err(Error::InvalidState { .. })
        ));
        assert_eq!(session.sends(), 1);
        assert_eq!(session.state(), SessionState::AwaitingPin);
    }

    #[test]
    fn test_run_answers_every_prompt() {
        let dev = ScriptedTransport::new()
            .reply(MessageType::PinMatrixRequest, &pin_request(PinMatrixRequestType::NewFirst))
            .reply(MessageType::PinMatrixRequest, &pin_request(PinMatrixRequestType::NewSecond))
            .reply(MessageType::PassphraseRequest, &PassphraseRequest::default())
            .reply(MessageType::WordRequest, &WordRequest::default())
            .reply(MessageType::WordRequest, &WordRequest::default())
            .reply(MessageType::Success, &success("Device recovered"));
        let mut provider = Scripted {
            pins: VecDeque::from(vec!["1111".to_string(), "1111".to_string()]),
            passphrases: VecDeque::from(vec!["secret".to_string()]),
            words: VecDeque::from(vec!["cloud".to_string(), "flower".to_string()]),
            ..Scripted::default()
        };
        let mut session = Session::new(dev);

        let outcome = session
            .run(&requests::recovery(12, true, false), &mut provider)
            .unwrap();
        assert_eq!(outcome, Outcome::Success("Device recovered".into()));
        assert_eq!(
            provider.pin_kinds,
            vec![PinMatrixRequestType::NewFirst, PinMatrixRequestType::NewSecond]
        );
        assert_eq!(session.sends(), 6);

        let sent = session.into_handle().sent();
        let words: Vec<String> = sent
            .iter()
            .filter(|m| m.is(MessageType::WordAck))
            .map(|m| WordAck::decode(m.data.as_slice()).unwrap().word)
            .collect();
        assert_eq!(words, vec!["cloud", "flower"]);
    }

    #[test]
    fn test_declined_prompt_cancels() {
        let dev = ScriptedTransport::new()
            .reply(MessageType::PassphraseRequest, &PassphraseRequest::default());
        let mut provider = Scripted::default();
        let mut session = Session::new(dev);

        assert!(matches!(
            session.run(&requests::address_gen(1, 0, false), &mut provider),
            Err(Error::Cancelled)
        ));
        assert_eq!(
            session.into_handle().sent_kinds(),
            vec![MessageType::SkycoinAddress, MessageType::Cancel]
        );
    }

    #[test]
    fn test_abort_sends_cancel_and_returns_handle() {
        let dev = ScriptedTransport::new()
            .reply(MessageType::PinMatrixRequest, &pin_request(PinMatrixRequestType::Current));
        let mut session = Session::new(dev);
        session.start(&requests::backup_device()).unwrap();

        let dev = session.abort().unwrap();
        assert_eq!(
            dev.sent_kinds(),
            vec![MessageType::BackupDevice, MessageType::Cancel]
        );
    }
}
