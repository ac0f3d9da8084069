use super::{Message, MessageType};
use core::time::Duration;

const TIMEOUT: Duration = Duration::from_millis(5000);
// Address derivation and transaction signing run on the device before it answers.
const SLOW_TIMEOUT: Duration = Duration::from_millis(60 * 1000);
// After a ButtonAck the device waits for a physical button press.
const LONG_TIMEOUT: Duration = Duration::from_millis(5 * 60 * 1000);
const QUICK_TIMEOUT: Duration = Duration::from_millis(2000);

impl Message {
    /// How long to wait for the reply to this request.
    pub fn read_timeout(&self) -> Duration {
        match self.message_type() {
            Some(MessageType::ButtonAck) => LONG_TIMEOUT,
            Some(MessageType::Initialize | MessageType::GetFeatures | MessageType::Cancel) => {
                QUICK_TIMEOUT
            }
            Some(
                MessageType::SkycoinAddress
                | MessageType::TransactionSign
                | MessageType::SkycoinSignMessage
                | MessageType::SkycoinCheckMessageSignature,
            ) => SLOW_TIMEOUT,
            _ => TIMEOUT,
        }
    }

    pub fn write_timeout(&self) -> Duration {
        match self.message_type() {
            Some(MessageType::Initialize | MessageType::GetFeatures) => QUICK_TIMEOUT,
            _ => TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_ack_waits_for_the_user() {
        let ack = Message::new(MessageType::ButtonAck as u16, vec![]);
        assert_eq!(ack.read_timeout(), LONG_TIMEOUT);
        let init = Message::new(MessageType::Initialize as u16, vec![]);
        assert_eq!(init.read_timeout(), QUICK_TIMEOUT);
        assert_eq!(Message::new(999, vec![]).read_timeout(), TIMEOUT);
    }
}
