//! Store key layout.
//!
//! ```text
//! <root>/ipam/v{4|6}/assignment/<pool with '/' -> '-'>/<address>
//! ```
//!
//! CIDR text never contains `-`, so escaping is injective: distinct pools
//! never share a namespace.

use crate::pool::Pool;
use std::net::IpAddr;

/// Maps pools and addresses to store keys under a namespace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    root: String,
}

impl KeyLayout {
    /// Create a layout rooted at `root` (e.g. `/calico/v1`).
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
        }
    }

    /// The namespace root without trailing separator.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Directory holding every assignment record of `pool`.
    pub fn namespace_key(&self, pool: &Pool) -> String {
        format!(
            "{}/ipam/{}/assignment/{}",
            self.root,
            pool.version(),
            escape_pool(pool)
        )
    }

    /// Assignment record key for `address` in `pool`.
    pub fn assignment_key(&self, pool: &Pool, address: &IpAddr) -> String {
        format!("{}/{}", self.namespace_key(pool), address)
    }
}

/// Pool identifier as a single key path segment.
pub fn escape_pool(pool: &Pool) -> String {
    pool.to_string().replace('/', "-")
}
