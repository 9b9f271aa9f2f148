//! Assignment record storage.
//!
//! - [`backend`] - the store protocol boundary ([`KvBackend`])
//! - [`address_store`] - pool/address-scoped primitives ([`AddressStore`])
//! - [`keys`] - key layout and pool escaping
//! - [`memory`] - in-process backend
//! - [`etcd`] - etcd v3 backend (feature `grpc`)
//! - [`state_machine`] - revisioned KV index behind the in-process backend

pub mod address_store;
pub mod backend;
#[cfg(feature = "grpc")]
pub mod etcd;
pub mod keys;
pub mod memory;
pub mod state_machine;

pub use address_store::AddressStore;
pub use backend::{KvBackend, KvError, KvResult};
pub use keys::KeyLayout;
pub use memory::MemoryBackend;

use crate::core::config::{BackendKind, StoreConfig};
use crate::core::error::IpamResult;
use std::sync::Arc;

/// Build the backend selected by `config`.
pub fn connect_backend(config: &StoreConfig) -> IpamResult<Arc<dyn KvBackend>> {
    match config.backend {
        BackendKind::Memory => Ok(Arc::new(MemoryBackend::new())),
        #[cfg(feature = "grpc")]
        BackendKind::Etcd => Ok(Arc::new(etcd::EtcdBackend::connect(config)?)),
        #[cfg(not(feature = "grpc"))]
        BackendKind::Etcd => Err(crate::core::error::IpamError::Store {
            message: "etcd backend requires the `grpc` feature".to_string(),
        }),
    }
}

/// Build an [`AddressStore`] over the backend selected by `config`.
pub fn open(config: &StoreConfig) -> IpamResult<AddressStore> {
    let backend = connect_backend(config)?;
    tracing::debug!(backend = backend.name(), root = %config.namespace_root, "address store opened");
    Ok(AddressStore::new(backend, config))
}
