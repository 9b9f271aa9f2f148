//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use async_trait::async_trait;
use ipalloc::store::backend::{KvBackend, KvError, KvResult};
use ipalloc::store::{AddressStore, KeyLayout, MemoryBackend};
use ipalloc::SequentialAllocator;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

pub const TEST_ROOT: &str = "/test/v1";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Write `content` to a temporary config file.
pub fn create_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

/// A config file selecting the in-process backend.
pub fn create_memory_config() -> NamedTempFile {
    create_config(
        r#"
[store]
backend = "memory"
namespace_root = "/test/v1"

[allocator]
max_attempts = 8
"#,
    )
}

pub fn store_over(backend: Arc<dyn KvBackend>) -> AddressStore {
    AddressStore::with_layout(backend, KeyLayout::new(TEST_ROOT), REQUEST_TIMEOUT)
}

pub fn store_with_timeout(backend: Arc<dyn KvBackend>, timeout: Duration) -> AddressStore {
    AddressStore::with_layout(backend, KeyLayout::new(TEST_ROOT), timeout)
}

/// Allocator over a fresh in-process store, plus the backend for inspection.
pub fn memory_allocator() -> (SequentialAllocator, MemoryBackend) {
    let backend = MemoryBackend::new();
    let allocator = SequentialAllocator::new(store_over(Arc::new(backend.clone())));
    (allocator, backend)
}

// ============================================================================
// Fault-injecting backends
// ============================================================================

/// Loses the next `steals` claims: each intercepted create first writes the
/// key itself, as a concurrent allocator would, then forwards the request.
#[derive(Debug)]
pub struct RacingBackend {
    inner: MemoryBackend,
    steals: AtomicU32,
    stolen: AtomicU32,
}

impl RacingBackend {
    pub fn new(inner: MemoryBackend, steals: u32) -> Self {
        Self {
            inner,
            steals: AtomicU32::new(steals),
            stolen: AtomicU32::new(0),
        }
    }

    /// Take away the next `steals` claims.
    pub fn arm(&self, steals: u32) {
        self.steals.store(steals, Ordering::SeqCst);
    }

    /// Claims taken away so far.
    pub fn stolen(&self) -> u32 {
        self.stolen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvBackend for RacingBackend {
    async fn create(&self, key: &str, value: &[u8]) -> KvResult<()> {
        let steal = self
            .steals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if steal {
            self.inner.create(key, b"rival").await?;
            self.stolen.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.create(key, value).await
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        self.inner.delete(key).await
    }

    async fn list_children(&self, dir: &str) -> KvResult<Vec<String>> {
        self.inner.list_children(dir).await
    }

    async fn create_dir(&self, dir: &str) -> KvResult<()> {
        self.inner.create_dir(dir).await
    }

    fn name(&self) -> &'static str {
        "racing"
    }
}

/// Fails every call with `error`, counting calls.
#[derive(Debug)]
pub struct FailingBackend {
    error: KvError,
    calls: AtomicU32,
}

impl FailingBackend {
    pub fn new(error: KvError) -> Self {
        Self {
            error,
            calls: AtomicU32::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self::new(KvError::Unavailable("connection refused".to_string()))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> KvResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

#[async_trait]
impl KvBackend for FailingBackend {
    async fn create(&self, _key: &str, _value: &[u8]) -> KvResult<()> {
        self.fail()
    }

    async fn delete(&self, _key: &str) -> KvResult<()> {
        self.fail()
    }

    async fn list_children(&self, _dir: &str) -> KvResult<Vec<String>> {
        self.fail()
    }

    async fn create_dir(&self, _dir: &str) -> KvResult<()> {
        self.fail()
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Which calls a [`StallingBackend`] never answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stall {
    Everything,
    Lists,
}

/// Never answers the selected calls; the rest go to an in-process store.
#[derive(Debug)]
pub struct StallingBackend {
    inner: MemoryBackend,
    stall: Stall,
}

impl StallingBackend {
    pub fn new(stall: Stall) -> Self {
        Self {
            inner: MemoryBackend::new(),
            stall,
        }
    }

    async fn hang() {
        std::future::pending::<()>().await
    }
}

#[async_trait]
impl KvBackend for StallingBackend {
    async fn create(&self, key: &str, value: &[u8]) -> KvResult<()> {
        if self.stall == Stall::Everything {
            Self::hang().await;
        }
        self.inner.create(key, value).await
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        if self.stall == Stall::Everything {
            Self::hang().await;
        }
        self.inner.delete(key).await
    }

    async fn list_children(&self, dir: &str) -> KvResult<Vec<String>> {
        Self::hang().await;
        self.inner.list_children(dir).await
    }

    async fn create_dir(&self, dir: &str) -> KvResult<()> {
        if self.stall == Stall::Everything {
            Self::hang().await;
        }
        self.inner.create_dir(dir).await
    }

    fn name(&self) -> &'static str {
        "stalling"
    }
}
