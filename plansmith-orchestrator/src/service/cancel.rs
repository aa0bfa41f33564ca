//! Per-job cancellation handle

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Why a job was stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Requested,
    TimedOut(Duration),
}

impl CancelReason {
    pub fn message(self) -> &'static str {
        match self {
            CancelReason::Requested => "job cancelled",
            CancelReason::TimedOut(_) => "job timed out",
        }
    }
}

/// Cancellation token plus the reason it fired
///
/// Only the first reason is kept.
#[derive(Debug, Clone, Default)]
pub struct JobCancellation {
    token: CancellationToken,
    reason: Arc<Mutex<Option<CancelReason>>>,
}

impl JobCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self, reason: CancelReason) {
        {
            let mut current = self.reason.lock();
            if current.is_none() {
                *current = Some(reason);
            }
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        *self.reason.lock()
    }
}
