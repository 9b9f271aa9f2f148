//! Address allocation.
//!
//! [`SequentialAllocator`] hands out the lowest free host address of a pool.
//! Coordination between allocators happens entirely in the store: a claim is
//! a create-if-absent, so when two allocators pick the same candidate exactly
//! one wins and the other rescans.

mod sequential;

pub use sequential::{first_free, SequentialAllocator};

use std::time::Duration;
use tokio::sync::watch;

/// Scan-and-claim attempts made before giving up with
/// [`IpamError::AllocationContention`](crate::IpamError::AllocationContention).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 64;

/// Per-call allocation policy.
///
/// `cancel` is a watch channel; sending `true` stops the allocation at the
/// next attempt boundary or while the allocator is waiting on a listing. An
/// in-flight claim always runs to completion, so a cancelled allocation never
/// leaves behind an assignment the caller does not know about.
#[derive(Debug, Clone)]
pub struct AllocateOptions {
    max_attempts: u32,
    deadline: Option<Duration>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Default for AllocateOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            deadline: None,
            cancel: None,
        }
    }
}

impl AllocateOptions {
    /// Set the attempt ceiling. Zero is treated as one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Bound the whole allocation by `deadline`, measured from the call.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a cancellation signal.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub(crate) fn cancel(&self) -> Option<watch::Receiver<bool>> {
        self.cancel.clone()
    }
}
