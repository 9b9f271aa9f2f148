//! Address pools and their usable host space.
//!
//! A [`Pool`] is a CIDR prefix parsed and normalized once at the API boundary.
//! Its usable host addresses are enumerated lazily in ascending numeric order:
//!
//! | Family | Prefix        | Excluded                         |
//! |--------|---------------|----------------------------------|
//! | IPv4   | `/0` – `/30`  | network and broadcast address    |
//! | IPv4   | `/31`, `/32`  | nothing                          |
//! | IPv6   | `/0` – `/127` | network (subnet-router anycast)  |
//! | IPv6   | `/128`        | nothing                          |

use crate::core::error::{IpamError, IpamResult};
use ipnet::IpNet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// IP protocol version of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Version number (4 or 6).
    pub fn number(&self) -> u8 {
        match self {
            Self::V4 => 4,
            Self::V6 => 6,
        }
    }

    /// Version of an address.
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// An address pool: one CIDR prefix with no host bits set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pool {
    net: IpNet,
}

impl Pool {
    /// Create a pool from a parsed network.
    ///
    /// Rejects prefixes with host bits set (`10.0.0.5/30`), so every pool has a
    /// single canonical form and a single store namespace.
    pub fn new(net: IpNet) -> IpamResult<Self> {
        let trunc = net.trunc();
        if trunc != net {
            return Err(IpamError::invalid_pool(
                net.to_string(),
                format!("host bits set; network address is {}", trunc),
            ));
        }
        Ok(Self { net })
    }

    /// The underlying network.
    pub fn net(&self) -> IpNet {
        self.net
    }

    /// IP version of the pool.
    pub fn version(&self) -> IpVersion {
        match self.net {
            IpNet::V4(_) => IpVersion::V4,
            IpNet::V6(_) => IpVersion::V6,
        }
    }

    /// Prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.net.prefix_len()
    }

    /// Check if an address lies inside the pool's prefix.
    pub fn contains(&self, addr: &IpAddr) -> bool {
        IpVersion::of(addr) == self.version() && self.net.contains(addr)
    }

    /// Check if an address is one the allocator would hand out.
    pub fn is_usable(&self, addr: &IpAddr) -> bool {
        if !self.contains(addr) {
            return false;
        }
        let (first, last) = self.usable_bounds();
        let bits = addr_bits(addr);
        first <= bits && bits <= last
    }

    /// Number of usable host addresses.
    pub fn usable_count(&self) -> u128 {
        let (first, last) = self.usable_bounds();
        last - first + 1
    }

    /// Iterate usable host addresses in ascending order.
    pub fn hosts(&self) -> Hosts {
        let (first, last) = self.usable_bounds();
        Hosts {
            version: self.version(),
            next: first,
            last,
            done: false,
        }
    }

    /// Inclusive numeric bounds of the usable host range.
    fn usable_bounds(&self) -> (u128, u128) {
        let network = addr_bits(&self.net.network());
        let broadcast = addr_bits(&self.net.broadcast());
        match self.version() {
            IpVersion::V4 if self.prefix_len() <= 30 => (network + 1, broadcast - 1),
            IpVersion::V6 if self.prefix_len() <= 127 => (network + 1, broadcast),
            _ => (network, broadcast),
        }
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.net)
    }
}

impl FromStr for Pool {
    type Err = IpamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let net = IpNet::from_str(trimmed)
            .map_err(|e| IpamError::invalid_pool(trimmed, e.to_string()))?;
        Self::new(net)
    }
}

/// Lazy ascending iterator over a pool's usable host addresses.
#[derive(Debug, Clone)]
pub struct Hosts {
    version: IpVersion,
    next: u128,
    last: u128,
    done: bool,
}

impl Iterator for Hosts {
    type Item = IpAddr;

    fn next(&mut self) -> Option<IpAddr> {
        if self.done {
            return None;
        }
        let current = self.next;
        if current == self.last {
            self.done = true;
        } else {
            self.next += 1;
        }
        Some(bits_to_addr(self.version, current))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let remaining = self.last - self.next;
        match usize::try_from(remaining).ok().and_then(|r| r.checked_add(1)) {
            Some(n) => (n, Some(n)),
            None => (usize::MAX, None),
        }
    }
}

fn addr_bits(addr: &IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(*v4)),
        IpAddr::V6(v6) => u128::from(*v6),
    }
}

fn bits_to_addr(version: IpVersion, bits: u128) -> IpAddr {
    match version {
        // Bounds come from a v4 prefix, so the value fits in 32 bits.
        IpVersion::V4 => IpAddr::V4(Ipv4Addr::from(bits as u32)),
        IpVersion::V6 => IpAddr::V6(Ipv6Addr::from(bits)),
    }
}
