use core::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Bounded retry for opening a device connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 100,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Run `op` until it succeeds or the attempts run out, calling `sleep`
    /// with the configured delay between consecutive attempts.
    pub fn retry<T, F, S>(&self, mut op: F, mut sleep: S) -> Result<T, TransportError>
    where
        F: FnMut(u32) -> Result<T, TransportError>,
        S: FnMut(Duration),
    {
        let attempts = self.attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("Connect attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        sleep(self.delay());
                    }
                }
            }
        }
        Err(TransportError::ConnectFailed {
            attempts,
            reason: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}
