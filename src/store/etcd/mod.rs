//! etcd v3 store backend.
//!
//! - [`client`] - [`EtcdBackend`], the `KvBackend` over etcd's KV service
//! - [`proto`] - hand-written wire messages for the RPCs it issues

pub mod client;
pub mod proto;

pub use client::EtcdBackend;
