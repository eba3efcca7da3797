// # Expiring Cache
//
// Bounded, expiry-ordered tables for the servers and domains learned from
// Router Advertisements.
//
// Both tables are instances of [`ExpiringTable`]; the entry type decides the
// uniqueness key through the [`Expiring`] trait.

pub mod entry;
pub mod table;

pub use entry::{DomainEntry, MAX_DOMAIN_LEN, ServerEntry};
pub use table::{ExpiringTable, UpdateOutcome};

use crate::clock::Timestamp;

/// An entry that can live in an [`ExpiringTable`]
pub trait Expiring {
    /// Absolute expiry of the entry
    fn expiry(&self) -> Timestamp;

    /// Whether `other` denotes the same record (ignoring expiry)
    fn same_key(&self, other: &Self) -> bool;
}
