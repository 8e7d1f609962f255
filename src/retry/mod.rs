//! Retry executor for throttled remote calls.
//!
//! [`RetryExecutor::execute`] runs an async operation and absorbs the store's
//! throttling signal: on [`RemoteError::Throttled`] it parks the calling task
//! for exactly the server-advised `retry_after` and tries again. Every other
//! error is returned on the spot, unchanged, after a single invocation.
//!
//! ```text
//! Running --ok--------------> Done
//! Running --throttled-------> Waiting --retry_after--> Running
//! Running --other error-----> Failed
//! ```
//!
//! The loop is unbounded unless a [`RetryPolicy`] sets a ceiling, and it can
//! be aborted through a `watch` channel passed to
//! [`RetryExecutor::with_cancellation`].

pub mod policy;

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::client::RemoteError;
use crate::error::{Error, Result};

pub use policy::RetryPolicy;

/// Ways the retry loop can stop without a result from the store.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// A policy ceiling was reached while the store kept throttling.
    #[error("gave up after {attempts} attempts and {waited:?} waiting: {last}")]
    Exhausted {
        /// Invocations made.
        attempts: u32,
        /// Total time spent waiting.
        waited: Duration,
        /// The last throttling error received.
        last: RemoteError,
    },

    /// The caller cancelled the loop.
    #[error("cancelled after {attempts} attempts")]
    Cancelled {
        /// Invocations made before cancellation.
        attempts: u32,
    },
}

/// Bookkeeping for one `execute` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Invocations of the operation so far.
    pub attempts: u32,
    /// The most recent pause.
    pub last_wait: Duration,
    /// Sum of all pauses.
    pub total_wait: Duration,
}

/// Runs remote operations, retrying those rejected by throttling.
///
/// The executor holds no per-call state, so one instance (or clones of it)
/// can serve any number of concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    cancel: Option<watch::Receiver<bool>>,
}

impl RetryExecutor {
    /// Creates an executor with the given policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancel: None,
        }
    }

    /// Aborts retry loops once `cancel` observes `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Returns the active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` until it succeeds or fails with a non-throttling error.
    ///
    /// # Errors
    /// * [`Error::Remote`] with the original error for anything but throttling
    /// * [`RetryError::Exhausted`] when a policy ceiling is hit
    /// * [`RetryError::Cancelled`] when the cancellation flag is raised
    pub async fn execute<V, F, Fut>(&self, operation: F) -> Result<V>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<V, RemoteError>>,
    {
        self.execute_with_state(operation)
            .await
            .map(|(value, _)| value)
    }

    /// Like [`execute`](Self::execute), also returning the retry bookkeeping.
    pub async fn execute_with_state<V, F, Fut>(&self, mut operation: F) -> Result<(V, RetryState)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<V, RemoteError>>,
    {
        let mut state = RetryState::default();

        loop {
            if self.is_cancelled() {
                warn!(attempts = state.attempts, "retry loop cancelled");
                return Err(RetryError::Cancelled {
                    attempts: state.attempts,
                }
                .into());
            }

            state.attempts += 1;
            let err = match operation().await {
                Ok(value) => return Ok((value, state)),
                Err(err) => err,
            };

            let wait = match &err {
                RemoteError::Throttled { retry_after, .. } => retry_after.unwrap_or(Duration::ZERO),
                _ => return Err(Error::Remote(err)),
            };

            if !self.policy.allows(state.attempts, state.total_wait, wait) {
                warn!(
                    attempts = state.attempts,
                    waited_ms = state.total_wait.as_millis() as u64,
                    "retry ceiling reached while throttled"
                );
                return Err(RetryError::Exhausted {
                    attempts: state.attempts,
                    waited: state.total_wait,
                    last: err,
                }
                .into());
            }

            debug!(
                attempt = state.attempts,
                retry_after_ms = wait.as_millis() as u64,
                "throttled, waiting before retry"
            );

            if !wait.is_zero() && !self.pause(wait).await {
                warn!(attempts = state.attempts, "retry loop cancelled while waiting");
                return Err(RetryError::Cancelled {
                    attempts: state.attempts,
                }
                .into());
            }

            state.last_wait = wait;
            state.total_wait += wait;
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Sleeps for `wait`. Returns false if cancelled first.
    async fn pause(&self, wait: Duration) -> bool {
        let Some(cancel) = &self.cancel else {
            tokio::time::sleep(wait).await;
            return true;
        };

        let mut cancel = cancel.clone();
        tokio::select! {
            _ = tokio::time::sleep(wait) => true,
            Ok(_) = cancel.wait_for(|cancelled| *cancelled) => false,
        }
    }
}
