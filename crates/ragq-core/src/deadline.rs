//! Caller-supplied deadlines and cancellation for the dense-recall stage.
//!
//! A [`Deadline`] combines an optional expiry instant with a shared
//! [`CancelToken`]. Only network-bound work consults it; in-process scoring
//! never blocks and never checks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::RetrievalError;

/// Shared cancellation flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every holder of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Time budget and cancellation hook for one retrieval request.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    expires_at: Option<Instant>,
    cancel: Option<CancelToken>,
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

impl Deadline {
    /// No expiry and no cancellation.
    #[must_use]
    pub fn none() -> Self {
        Self {
            started: Instant::now(),
            expires_at: None,
            cancel: None,
        }
    }

    /// Expire `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            expires_at: started.checked_add(budget),
            cancel: None,
        }
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// True when neither an expiry nor a cancel token is attached.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.expires_at.is_none() && self.cancel.is_none()
    }

    /// Time left before expiry. `None` when there is no expiry.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail with `Cancelled` or `DeadlineExceeded` if the request must stop.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Cancelled`] once the token fires and
    /// [`RetrievalError::DeadlineExceeded`] once the expiry has passed.
    pub fn check(&self) -> Result<(), RetrievalError> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(RetrievalError::Cancelled);
        }
        if self.expires_at.is_some_and(|at| Instant::now() >= at) {
            return Err(RetrievalError::DeadlineExceeded {
                elapsed: self.elapsed(),
            });
        }
        Ok(())
    }

    /// Per-call I/O timeout: the remaining budget capped by `ceiling`.
    #[must_use]
    pub fn io_timeout(&self, ceiling: Duration) -> Duration {
        self.remaining()
            .map_or(ceiling, |left| left.min(ceiling))
            .max(Duration::from_millis(1))
    }
}
