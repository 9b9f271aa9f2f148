//! In-process store backend.
//!
//! Every primitive runs under a single lock acquisition on a
//! [`KvStateMachine`], which makes each one linearizable across all clones of
//! the backend. Assignments live only as long as the process.

use super::backend::{dir_prefix, leaf_child, prefix_range_end, KvBackend, KvError, KvResult};
use super::state_machine::{KvStateMachine, KvStateMachineStats};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared in-memory backend. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state_machine: Arc<RwLock<KvStateMachine>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a raw key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.state_machine.read().contains(key.as_bytes())
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> Vec<String> {
        self.state_machine
            .read()
            .range(b"", None)
            .into_iter()
            .map(|r| String::from_utf8_lossy(&r.key).into_owned())
            .collect()
    }

    /// Get statistics about the underlying state machine.
    pub fn stats(&self) -> KvStateMachineStats {
        self.state_machine.read().stats()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn create(&self, key: &str, value: &[u8]) -> KvResult<()> {
        let mut sm = self.state_machine.write();
        if sm.create(key.as_bytes().to_vec(), value.to_vec()) {
            Ok(())
        } else {
            Err(KvError::AlreadyExists)
        }
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        let mut sm = self.state_machine.write();
        sm.delete(key.as_bytes()).map(|_| ()).ok_or(KvError::NotFound)
    }

    async fn list_children(&self, dir: &str) -> KvResult<Vec<String>> {
        let prefix = dir_prefix(dir);
        let end = prefix_range_end(prefix.as_bytes());
        let sm = self.state_machine.read();
        let records = sm.range(prefix.as_bytes(), Some(end.as_slice()));
        if records.is_empty() {
            return Err(KvError::NotFound);
        }

        Ok(records
            .into_iter()
            .filter_map(|r| {
                let key = std::str::from_utf8(&r.key).ok()?;
                leaf_child(&prefix, key).map(str::to_string)
            })
            .collect())
    }

    async fn create_dir(&self, dir: &str) -> KvResult<()> {
        let marker = dir_prefix(dir);
        let mut sm = self.state_machine.write();
        sm.create(marker.into_bytes(), Vec::new());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
