//! Outbound send with the retry-once policy.

use tracing::{debug, warn};

use crate::error::DeliveryError;
use crate::messenger::{Keyboard, Messenger};

/// How a single delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    /// Delivered on the second attempt.
    SentAfterRetry,
    /// Gave up; `transient` tells whether the last fault was a retryable kind.
    Failed { error: DeliveryError, transient: bool },
}

impl DeliveryOutcome {
    pub fn delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent | DeliveryOutcome::SentAfterRetry)
    }
}

/// Send `text`; a transient fault is retried once after its backoff.
///
/// Permanent faults (blocked recipient, malformed request) are not retried.
pub async fn deliver(
    messenger: &dyn Messenger,
    user_id: i64,
    text: &str,
    keyboard: Option<&Keyboard>,
) -> DeliveryOutcome {
    let first = match messenger.send(user_id, text, keyboard).await {
        Ok(()) => return DeliveryOutcome::Sent,
        Err(e) => e,
    };

    if !first.is_transient() {
        debug!(user_id, error = %first, "permanent delivery failure");
        return DeliveryOutcome::Failed {
            error: first,
            transient: false,
        };
    }

    let backoff = first.backoff();
    debug!(user_id, error = %first, backoff_ms = backoff.as_millis() as u64, "retrying delivery");
    tokio::time::sleep(backoff).await;

    match messenger.send(user_id, text, keyboard).await {
        Ok(()) => DeliveryOutcome::SentAfterRetry,
        Err(error) => {
            warn!(user_id, error = %error, "delivery failed after retry");
            let transient = error.is_transient();
            DeliveryOutcome::Failed { error, transient }
        }
    }
}
