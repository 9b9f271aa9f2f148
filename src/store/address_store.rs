//! Address-scoped store primitives.
//!
//! [`AddressStore`] turns the raw backend primitives into the three
//! operations the allocator needs, hiding key encoding and namespace
//! lifecycle. The backend's "already exists" and "not found" outcomes become
//! booleans here and never reach callers as errors.

use super::backend::{KvBackend, KvError, KvResult};
use super::keys::KeyLayout;
use crate::core::config::StoreConfig;
use crate::core::error::{IpamError, IpamResult};
use crate::pool::Pool;
use std::collections::BTreeSet;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Store-backed assignment records for pools.
///
/// Cheap to clone; clones share the backend. Nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct AddressStore {
    backend: Arc<dyn KvBackend>,
    layout: KeyLayout,
    request_timeout: Duration,
}

impl AddressStore {
    /// Create a store using the namespace root and request timeout from
    /// `config`.
    pub fn new(backend: Arc<dyn KvBackend>, config: &StoreConfig) -> Self {
        Self::with_layout(
            backend,
            KeyLayout::new(config.namespace_root.clone()),
            config.request_timeout(),
        )
    }

    /// Create a store with an explicit layout and request timeout.
    pub fn with_layout(
        backend: Arc<dyn KvBackend>,
        layout: KeyLayout,
        request_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            layout,
            request_timeout,
        }
    }

    /// Key layout in use.
    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    /// Label of the backend in use.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Atomically create the assignment record for `address` in `pool`.
    ///
    /// Returns `false` when the record already existed.
    pub async fn claim(&self, pool: &Pool, address: IpAddr) -> IpamResult<bool> {
        check_member(pool, &address)?;
        let key = self.layout.assignment_key(pool, &address);
        match self.round_trip("claim", self.backend.create(&key, b"")).await? {
            Ok(()) => Ok(true),
            Err(KvError::AlreadyExists) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the assignment record for `address` in `pool`.
    ///
    /// Returns `false` when there was no record.
    pub async fn release(&self, pool: &Pool, address: IpAddr) -> IpamResult<bool> {
        check_member(pool, &address)?;
        let key = self.layout.assignment_key(pool, &address);
        match self.round_trip("release", self.backend.delete(&key)).await? {
            Ok(()) => {
                tracing::info!(pool = %pool, address = %address, "address released");
                Ok(true)
            }
            Err(KvError::NotFound) => {
                tracing::debug!(pool = %pool, address = %address, "release of unassigned address");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Addresses currently assigned in `pool`.
    ///
    /// A pool seen for the first time has no namespace yet; it is created
    /// empty and an empty set returned.
    pub async fn list_assigned(&self, pool: &Pool) -> IpamResult<BTreeSet<IpAddr>> {
        let namespace = self.layout.namespace_key(pool);
        let children = match self
            .round_trip("list", self.backend.list_children(&namespace))
            .await?
        {
            Ok(children) => children,
            Err(KvError::NotFound) => {
                self.round_trip("create_dir", self.backend.create_dir(&namespace))
                    .await??;
                tracing::debug!(pool = %pool, namespace = %namespace, "pool namespace created");
                return Ok(BTreeSet::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut assigned = BTreeSet::new();
        for name in children {
            match name.parse::<IpAddr>() {
                Ok(addr) if pool.contains(&addr) => {
                    assigned.insert(addr);
                }
                _ => {
                    tracing::warn!(pool = %pool, record = %name, "ignoring foreign assignment record");
                }
            }
        }
        Ok(assigned)
    }

    /// Run one backend round trip under the request timeout.
    ///
    /// The outer result carries the timeout; the inner one is the backend's
    /// own outcome for the caller to interpret.
    async fn round_trip<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = KvResult<T>>,
    ) -> IpamResult<KvResult<T>> {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => Ok(result),
            Err(_) => {
                tracing::warn!(
                    operation,
                    backend = self.backend.name(),
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "store round trip timed out"
                );
                Err(IpamError::StoreTimeout {
                    operation,
                    timeout_ms: self.request_timeout.as_millis() as u64,
                })
            }
        }
    }
}

fn check_member(pool: &Pool, address: &IpAddr) -> IpamResult<()> {
    if pool.contains(address) {
        Ok(())
    } else {
        Err(IpamError::InvalidAddress {
            address: address.to_string(),
            pool: pool.to_string(),
        })
    }
}
