//! Store protocol boundary.
//!
//! The allocator depends on exactly four primitives of the backing store:
//! create-if-absent, delete-if-present, list immediate children of a
//! directory, and create an empty directory marker.
//!
//! Directories are emulated on a flat key space. A directory `D` is marked by
//! the key `D/` holding an empty value, and `D` exists as soon as any key
//! starts with `D/`, so writing a child implicitly materializes its parent.

use async_trait::async_trait;
use thiserror::Error;

/// Result type for backend operations.
pub type KvResult<T> = Result<T, KvError>;

/// Backend error conditions.
///
/// `AlreadyExists` and `NotFound` are expected outcomes of the conditional
/// primitives; callers decide whether they are failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvError {
    /// Conditional create found the key present.
    #[error("key already exists")]
    AlreadyExists,

    /// Conditional delete or directory listing found nothing.
    #[error("key not found")]
    NotFound,

    /// The store could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The store reported a deadline expiry.
    #[error("deadline exceeded: {0}")]
    Timeout(String),

    /// The credentials in use may not perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Any other store failure.
    #[error("internal: {0}")]
    Internal(String),
}

/// Key-value store primitives consumed by [`super::AddressStore`].
#[async_trait]
pub trait KvBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Atomically create `key` with `value`; `AlreadyExists` if present.
    async fn create(&self, key: &str, value: &[u8]) -> KvResult<()>;

    /// Delete `key`; `NotFound` if absent.
    async fn delete(&self, key: &str) -> KvResult<()>;

    /// Names of the immediate leaf children of `dir`; `NotFound` if the
    /// directory does not exist.
    async fn list_children(&self, dir: &str) -> KvResult<Vec<String>>;

    /// Create an empty directory marker for `dir`. Idempotent.
    async fn create_dir(&self, dir: &str) -> KvResult<()>;

    /// Short backend label for logs.
    fn name(&self) -> &'static str;
}

/// Key of the directory marker for `dir`, which is also the prefix shared by
/// all of its children.
pub fn dir_prefix(dir: &str) -> String {
    format!("{}/", dir.trim_end_matches('/'))
}

/// Smallest key greater than every key starting with `prefix`.
///
/// Mirrors etcd's prefix range end: increment the last byte that is not
/// `0xff` and drop everything after it. A prefix of all `0xff` bytes has no
/// upper bound and yields `[0]`, etcd's "to the end of the keyspace".
pub fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return end;
        }
    }
    vec![0]
}

/// Immediate leaf child name of `key` under `prefix`, if any.
///
/// Skips the directory marker itself (empty remainder) and anything nested
/// below a sub-directory.
pub fn leaf_child<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    let rest = key.strip_prefix(prefix)?;
    if rest.is_empty() || rest.contains('/') {
        None
    } else {
        Some(rest)
    }
}
