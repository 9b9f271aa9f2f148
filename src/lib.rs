//! ipalloc - sequential IP address allocation over a strongly-consistent store.
//!
//! Independent callers, possibly on different hosts, allocate addresses from
//! shared pools without talking to each other. Every assignment is a record
//! in the store, and claiming an address is a create-if-absent of its record,
//! so two callers can never both hold the same address.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     SequentialAllocator                         │
//! │     list assigned → lowest free host → claim → rescan on loss   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        AddressStore                             │
//! │     claim │ release │ list assigned │ key layout │ timeouts     │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         KvBackend                               │
//! │          etcd v3 (gRPC)          │        in-process            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::error`] - Error types and mapping
//!
//! ## Pools
//! - [`pool`] - Normalized CIDR pools and host enumeration
//!
//! ## Store
//! - [`store::backend`] - Store protocol boundary
//! - [`store::address_store`] - Claim, release and listing of assignments
//! - [`store::keys`] - Assignment key layout
//! - [`store::memory`] - In-process backend
//! - `store::etcd` - etcd v3 backend (feature `grpc`)
//!
//! ## Allocation
//! - [`allocator`] - Lowest-free-address allocation with bounded retries
//!
//! ## Operations
//! - [`ops::telemetry`] - Log subscriber installation
//!
//! ## CLI
//! - [`cli::commands`] - CLI command implementations
//!
//! # Key Invariants
//!
//! - An address is held by at most one caller: claims are conditional creates
//! - Network and broadcast addresses are never handed out
//! - Allocation returns the lowest free usable host observed by its last scan
//! - A lost claim race never surfaces as an error until the retry ceiling
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> ipalloc::IpamResult<()> {
//! use ipalloc::{AddressStore, MemoryBackend, Pool, SequentialAllocator, StoreConfig};
//! use std::sync::Arc;
//!
//! let store = AddressStore::new(Arc::new(MemoryBackend::new()), &StoreConfig::default());
//! let allocator = SequentialAllocator::new(store);
//! let pool: Pool = "10.0.0.0/30".parse()?;
//! assert_eq!(allocator.allocate(&pool).await?, Some("10.0.0.1".parse().unwrap()));
//! # Ok(())
//! # }
//! ```

// Core infrastructure
pub mod core;

// Address pools
pub mod pool;

// Assignment storage
pub mod store;

// Allocation
pub mod allocator;

// Operations
pub mod ops;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::config::{Config, ConfigOverrides, StoreConfig};
pub use self::core::error::{IpamError, IpamResult};
pub use self::core::{config, error};
pub use allocator::{AllocateOptions, SequentialAllocator};
pub use pool::{IpVersion, Pool};
pub use store::{AddressStore, KvBackend, KvError, MemoryBackend};
