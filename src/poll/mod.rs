//! Out-of-band confirmation polling.
//!
//! When a flow hands off to an email link, completion is observed by
//! polling the provider until the reply embeds an interaction code, then
//! exchanging that code for tokens. Every poll loop is bounded and
//! cancellable.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::{PollStatus, RemoteIdentityClient};
use crate::error::FlowError;
use crate::store::{TokenPair, TokenStore};

const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);
// 150 ticks at the default interval ≈ five minutes, matching the
// provider's email-link validity window.
const DEFAULT_MAX_ATTEMPTS: u32 = 150;

/// Upper bound on a poll loop. There is no unbounded variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDeadline {
    /// Stop after this many requests.
    MaxAttempts(u32),
    /// Stop once the wall clock passes this instant.
    At(DateTime<Utc>),
}

impl PollDeadline {
    fn exceeded(&self, attempts_made: u32) -> bool {
        match self {
            Self::MaxAttempts(max) => attempts_made >= *max,
            Self::At(when) => Utc::now() >= *when,
        }
    }
}

/// Descriptor for one awaited email confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollHandle {
    pub poll_url: String,
    pub state_handle: String,
    pub interval: Duration,
    pub deadline: PollDeadline,
}

impl PollHandle {
    pub fn new(poll_url: impl Into<String>, state_handle: impl Into<String>) -> Self {
        Self {
            poll_url: poll_url.into(),
            state_handle: state_handle.into(),
            interval: DEFAULT_INTERVAL,
            deadline: PollDeadline::MaxAttempts(DEFAULT_MAX_ATTEMPTS),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_deadline(mut self, deadline: PollDeadline) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Interval and deadline applied to handles the flow machine creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub deadline: PollDeadline,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            deadline: PollDeadline::MaxAttempts(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

impl PollPolicy {
    pub(crate) fn handle_for(
        &self,
        poll_url: impl Into<String>,
        state_handle: impl Into<String>,
    ) -> PollHandle {
        PollHandle::new(poll_url, state_handle)
            .with_interval(self.interval)
            .with_deadline(self.deadline)
    }
}

/// Drives one awaited confirmation to completion.
pub struct PollingCoordinator {
    client: Arc<dyn RemoteIdentityClient>,
    store: Arc<dyn TokenStore>,
}

impl PollingCoordinator {
    pub fn new(client: Arc<dyn RemoteIdentityClient>, store: Arc<dyn TokenStore>) -> Self {
        Self { client, store }
    }

    /// Poll until the email link is confirmed, the deadline passes, or the
    /// caller cancels.
    ///
    /// One request per tick. Cancellation is honored at every suspension
    /// point: a cancelled poll returns [`ErrorKind::Cancelled`] and issues
    /// no further requests. Exceeding the deadline returns
    /// [`ErrorKind::Timeout`].
    ///
    /// Completion is a two-step exchange: the poll reply embeds an
    /// interaction code, which is then traded for tokens in a second
    /// round-trip. The pair is committed to the store before returning.
    ///
    /// [`ErrorKind::Cancelled`]: crate::error::ErrorKind::Cancelled
    /// [`ErrorKind::Timeout`]: crate::error::ErrorKind::Timeout
    pub async fn poll_until_confirmed(
        &self,
        handle: &PollHandle,
        cancel: &CancellationToken,
    ) -> Result<TokenPair, FlowError> {
        let mut attempts: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(FlowError::cancelled());
            }
            if handle.deadline.exceeded(attempts) {
                warn!(attempts, "confirmation poll deadline exceeded");
                return Err(FlowError::timeout(format!(
                    "no confirmation after {attempts} attempts"
                )));
            }
            attempts += 1;
            let status = self
                .client
                .poll_status(&handle.poll_url, &handle.state_handle)
                .await?;
            match status {
                PollStatus::Confirmed { interaction_code } => {
                    debug!(attempts, "email confirmation received");
                    let meta = self.client.transaction_meta(&handle.state_handle).await?;
                    let pair = self.client.exchange_code(&interaction_code, &meta).await?;
                    self.store.set_tokens(pair.clone());
                    return Ok(pair);
                }
                PollStatus::Pending => {
                    debug!(attempt = attempts, "confirmation pending");
                }
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(FlowError::cancelled());
                }
                _ = tokio::time::sleep(handle.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn attempt_deadline_counts_requests() {
        let deadline = PollDeadline::MaxAttempts(3);
        assert!(!deadline.exceeded(0));
        assert!(!deadline.exceeded(2));
        assert!(deadline.exceeded(3));
    }

    #[test]
    fn absolute_deadline_tracks_the_clock() {
        let past = PollDeadline::At(Utc::now() - ChronoDuration::seconds(1));
        let future = PollDeadline::At(Utc::now() + ChronoDuration::hours(1));
        assert!(past.exceeded(0));
        assert!(!future.exceeded(1000));
    }

    #[test]
    fn policy_is_applied_to_new_handles() {
        let policy = PollPolicy {
            interval: Duration::from_millis(250),
            deadline: PollDeadline::MaxAttempts(4),
        };
        let handle = policy.handle_for("https://id.example.com/poll", "02handle");
        assert_eq!(handle.interval, Duration::from_millis(250));
        assert_eq!(handle.deadline, PollDeadline::MaxAttempts(4));
    }
}
