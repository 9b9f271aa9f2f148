//! Revisioned KV index backing the in-process store.
//!
//! Records carry etcd-style revision metadata so that "does not exist" means
//! exactly what it does on etcd: `create_revision == 0`.

use std::collections::BTreeMap;

/// A key-value record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvRecord {
    /// The key (byte string).
    pub key: Vec<u8>,

    /// The value (byte string).
    pub value: Vec<u8>,

    /// Revision when this key was created.
    pub create_revision: u64,
}

/// KV state machine.
///
/// Every mutation advances the store revision by one. Deleted keys are
/// removed from the index outright; there is no history to serve.
#[derive(Debug, Default)]
pub struct KvStateMachine {
    /// Current revision.
    current_revision: u64,

    /// Key → current record.
    index: BTreeMap<Vec<u8>, KvRecord>,
}

impl KvStateMachine {
    /// Create an empty state machine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current revision.
    pub fn current_revision(&self) -> u64 {
        self.current_revision
    }

    /// Get a key's current record.
    pub fn get(&self, key: &[u8]) -> Option<&KvRecord> {
        self.index.get(key)
    }

    /// Check if a key exists.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    /// Create revision of a key, `0` if absent.
    pub fn create_revision(&self, key: &[u8]) -> u64 {
        self.get(key).map_or(0, |r| r.create_revision)
    }

    /// Records with `start <= key < end`.
    ///
    /// `None` and etcd's `[0]` sentinel are unbounded above; an end at or
    /// below `start` selects nothing.
    pub fn range(&self, start: &[u8], end: Option<&[u8]>) -> Vec<&KvRecord> {
        let range_iter: Box<dyn Iterator<Item = (&Vec<u8>, &KvRecord)>> = match end {
            Some([0]) | None => Box::new(self.index.range(start.to_vec()..)),
            Some(end_key) if end_key <= start => return Vec::new(),
            Some(end_key) => Box::new(self.index.range(start.to_vec()..end_key.to_vec())),
        };
        range_iter.map(|(_, record)| record).collect()
    }

    /// Create `key` at the next revision unless it already exists.
    ///
    /// Records are write-once; returns whether the write happened. A refused
    /// create does not advance the revision.
    pub fn create(&mut self, key: Vec<u8>, value: Vec<u8>) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.current_revision += 1;
        let record = KvRecord {
            key: key.clone(),
            value,
            create_revision: self.current_revision,
        };
        self.index.insert(key, record);
        true
    }

    /// Delete a key at the next revision.
    ///
    /// Returns the deleted record if it existed. Deleting an absent key does
    /// not advance the revision.
    pub fn delete(&mut self, key: &[u8]) -> Option<KvRecord> {
        let prev = self.index.remove(key)?;
        self.current_revision += 1;
        Some(prev)
    }

    /// Get statistics about the state machine.
    pub fn stats(&self) -> KvStateMachineStats {
        KvStateMachineStats {
            current_revision: self.current_revision,
            key_count: self.index.len(),
        }
    }
}

/// Statistics for a KV state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvStateMachineStats {
    /// Current revision.
    pub current_revision: u64,
    /// Number of live keys.
    pub key_count: usize,
}
