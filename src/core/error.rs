//! Error types for the allocation engine.
//!
//! Store-level failures propagate unchanged to the caller. The expected
//! "record already exists" and "record absent" outcomes never appear here:
//! [`crate::store::AddressStore`] converts them to booleans at its boundary.

use crate::store::backend::KvError;
use thiserror::Error;

/// Allocation engine error conditions.
#[derive(Debug, Error)]
pub enum IpamError {
    /// The backing store could not be reached.
    #[error("store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// A single store round trip exceeded the configured request timeout.
    #[error("store {operation} timed out after {timeout_ms}ms")]
    StoreTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Any other store failure (permission, internal).
    #[error("store error: {message}")]
    Store { message: String },

    /// Retry ceiling exceeded while racing other callers for addresses.
    #[error("allocation contention: no claim succeeded after {attempts} attempts")]
    AllocationContention { attempts: u32 },

    /// The caller-supplied allocation deadline expired.
    #[error("allocation deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },

    /// The caller cancelled the allocation.
    #[error("allocation cancelled")]
    Cancelled,

    /// Malformed or non-enumerable pool specification.
    #[error("invalid pool {pool}: {reason}")]
    InvalidPool { pool: String, reason: String },

    /// Address does not belong to the pool it was presented with.
    #[error("address {address} is not a member of pool {pool}")]
    InvalidAddress { address: String, pool: String },
}

impl IpamError {
    /// Create an InvalidPool error.
    pub fn invalid_pool(pool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPool {
            pool: pool.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error originated in the backing store rather than in
    /// allocation logic.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::StoreTimeout { .. } | Self::Store { .. }
        )
    }

    /// Check if retrying the whole operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. }
                | Self::StoreTimeout { .. }
                | Self::AllocationContention { .. }
        )
    }

    /// Check if the request itself was rejected before touching the store.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidPool { .. } | Self::InvalidAddress { .. })
    }
}

impl From<KvError> for IpamError {
    fn from(err: KvError) -> Self {
        match err {
            KvError::Unavailable(message) => Self::StoreUnavailable { message },
            // A deadline reported by the store itself, as opposed to our own
            // request timeout, is still a connectivity-class failure.
            KvError::Timeout(message) => Self::StoreUnavailable { message },
            KvError::PermissionDenied(message) => Self::Store {
                message: format!("permission denied: {}", message),
            },
            KvError::Internal(message) => Self::Store { message },
            KvError::AlreadyExists | KvError::NotFound => Self::Store {
                message: format!("unexpected store outcome: {}", err),
            },
        }
    }
}

/// Result type using IpamError.
pub type IpamResult<T> = Result<T, IpamError>;
