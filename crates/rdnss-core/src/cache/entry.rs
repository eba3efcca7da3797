// # Cache Entries
//
// The two kinds of records learned from Router Advertisements.
//
// ## Uniqueness
//
// - Servers are keyed by address. Link-local addresses are only meaningful
//   together with the interface they were learned on, so for those the
//   interface index is part of the key.
// - Domains are keyed by their exact name.

use std::fmt;
use std::net::Ipv6Addr;

use super::Expiring;
use crate::clock::Timestamp;

/// Maximum domain length accepted into the search list (resolver limit)
pub const MAX_DOMAIN_LEN: usize = 256;

/// A recursive DNS server advertised by a router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEntry {
    /// Server address
    pub addr: Ipv6Addr,
    /// Index of the interface the advertisement arrived on
    pub ifindex: u32,
    /// Absolute expiry
    pub expiry: Timestamp,
}

impl ServerEntry {
    pub fn new(addr: Ipv6Addr, ifindex: u32, expiry: Timestamp) -> Self {
        Self {
            addr,
            ifindex,
            expiry,
        }
    }

    /// Whether the address needs an interface scope to be usable
    pub fn is_link_local(&self) -> bool {
        self.addr.is_unicast_link_local()
    }
}

impl Expiring for ServerEntry {
    fn expiry(&self) -> Timestamp {
        self.expiry
    }

    fn same_key(&self, other: &Self) -> bool {
        self.addr == other.addr && (!self.is_link_local() || self.ifindex == other.ifindex)
    }
}

impl fmt::Display for ServerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_link_local() {
            write!(f, "{}%{}", self.addr, self.ifindex)
        } else {
            write!(f, "{}", self.addr)
        }
    }
}

/// A DNS search domain advertised by a router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEntry {
    /// Dot-joined domain name, without trailing dot
    pub name: String,
    /// Absolute expiry
    pub expiry: Timestamp,
}

impl DomainEntry {
    pub fn new(name: impl Into<String>, expiry: Timestamp) -> Self {
        Self {
            name: name.into(),
            expiry,
        }
    }
}

impl Expiring for DomainEntry {
    fn expiry(&self) -> Timestamp {
        self.expiry
    }

    fn same_key(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Display for DomainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
