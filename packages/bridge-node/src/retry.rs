//! Delivery retry policy
//!
//! Maps a failed delivery to the relayer's next move. There is no retry cap:
//! a message below quorum stays pending for as long as the node runs, with
//! backoff capped at `max_backoff`.

use bridge_core::{BridgeError, ErrorClass};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential growth
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate backoff duration for a given attempt (0-indexed)
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let backoff_secs =
            self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = backoff_secs.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

/// What the relayer does after a delivery attempt fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryAction {
    /// Keep the message pending and try again after the backoff
    RetryAfter(Duration),
    /// The nonce is already processed on the destination; nothing left to do
    Settled,
    /// Never deliverable through this path; drop and report
    Abandon,
}

impl RetryConfig {
    pub fn next_action(&self, error: &BridgeError, attempt: u32) -> RetryAction {
        match error {
            // Lost a race with another relayer, or delivered on an earlier pass
            BridgeError::DuplicateNonce { .. } => RetryAction::Settled,
            // The destination can be unpaused by governance
            BridgeError::BridgePaused => RetryAction::RetryAfter(self.backoff_for_attempt(attempt)),
            _ => match error.class() {
                ErrorClass::Retryable => {
                    let backoff = self.backoff_for_attempt(attempt);
                    debug!(?backoff, attempt, error = %error, "Retrying delivery after backoff");
                    RetryAction::RetryAfter(backoff)
                }
                ErrorClass::Terminal | ErrorClass::CallerError => RetryAction::Abandon,
            },
        }
    }
}
