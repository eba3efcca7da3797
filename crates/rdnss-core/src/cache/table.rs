//! Fixed-capacity table sorted by descending expiry
//!
//! The soonest-to-expire entry is always the last element, which makes both
//! eviction and trimming a look at the tail of the table.
//!
//! ## Admission policy
//!
//! | Situation                      | Outcome                                   |
//! |--------------------------------|-------------------------------------------|
//! | key already present            | entry overwritten ([`UpdateOutcome::Refreshed`]) |
//! | new, already expired           | discarded ([`UpdateOutcome::Expired`])    |
//! | new, room left                 | appended ([`UpdateOutcome::Inserted`])    |
//! | new, full, outlives the tail   | tail overwritten ([`UpdateOutcome::Replaced`]) |
//! | new, full, expires before tail | discarded ([`UpdateOutcome::Rejected`])   |
//!
//! A refresh may set the expiry to `now`; the entry then disappears on the next
//! [`ExpiringTable::trim`]. This is how a zero lifetime withdraws a record.

use super::Expiring;
use crate::clock::Timestamp;

/// What [`ExpiringTable::update`] did with an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome<T> {
    /// An entry with the same key existed and was overwritten
    Refreshed,
    /// The entry was added to a table with free room
    Inserted,
    /// The table was full; the returned soonest-to-expire entry was evicted
    Replaced(T),
    /// The entry expired on arrival and was not added
    Expired,
    /// The table was full and the entry would have been the soonest to expire
    Rejected,
}

/// Bounded table of expiring entries, sorted by descending expiry
#[derive(Debug, Clone)]
pub struct ExpiringTable<T> {
    entries: Vec<T>,
    capacity: usize,
}

impl<T: Expiring> ExpiringTable<T> {
    /// Create an empty table holding at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert or refresh an entry
    ///
    /// # Parameters
    ///
    /// - `entry`: The new record, carrying its absolute expiry
    /// - `now`: Current time; new entries expiring at or before it are dropped
    pub fn update(&mut self, entry: T, now: Timestamp) -> UpdateOutcome<T> {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.same_key(&entry)) {
            *existing = entry;
            self.sort();
            return UpdateOutcome::Refreshed;
        }

        if entry.expiry() <= now {
            return UpdateOutcome::Expired;
        }

        if self.entries.len() < self.capacity {
            self.entries.push(entry);
            self.sort();
            return UpdateOutcome::Inserted;
        }

        match self.entries.last_mut() {
            Some(last) if entry.expiry() >= last.expiry() => {
                let evicted = std::mem::replace(last, entry);
                self.sort();
                UpdateOutcome::Replaced(evicted)
            }
            _ => UpdateOutcome::Rejected,
        }
    }

    /// Drop every entry that has expired at `now`
    ///
    /// Returns the number of entries removed.
    pub fn trim(&mut self, now: Timestamp) -> usize {
        let live = self
            .entries
            .iter()
            .rposition(|e| e.expiry() > now)
            .map_or(0, |i| i + 1);
        let removed = self.entries.len() - live;
        self.entries.truncate(live);
        removed
    }

    /// Expiry of the entry that will expire first
    pub fn soonest_expiry(&self) -> Option<Timestamp> {
        self.entries.last().map(Expiring::expiry)
    }

    /// Entries in table order (latest expiry first)
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    /// Entries in table order as a slice
    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    /// Number of entries in the table
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn sort(&mut self) {
        self.entries
            .sort_unstable_by(|a, b| b.expiry().cmp(&a.expiry()));
    }
}

impl<'a, T: Expiring> IntoIterator for &'a ExpiringTable<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DomainEntry, ServerEntry};
    use std::net::Ipv6Addr;

    fn domain(name: &str, expiry: Timestamp) -> DomainEntry {
        DomainEntry::new(name, expiry)
    }

    fn expiries<T: Expiring>(table: &ExpiringTable<T>) -> Vec<Timestamp> {
        table.iter().map(Expiring::expiry).collect()
    }

    fn full_table() -> ExpiringTable<DomainEntry> {
        let mut table = ExpiringTable::with_capacity(2);
        table.update(domain("a.example", 100), 0);
        table.update(domain("b.example", 200), 0);
        table
    }

    #[test]
    fn test_insert_keeps_descending_order() {
        let mut table = ExpiringTable::with_capacity(4);
        for (name, expiry) in [("a", 30), ("b", 10), ("c", 50), ("d", 20)] {
            assert_eq!(table.update(domain(name, expiry), 0), UpdateOutcome::Inserted);
        }
        assert_eq!(expiries(&table), vec![50, 30, 20, 10]);
        assert_eq!(table.soonest_expiry(), Some(10));
    }

    #[test]
    fn test_repeated_update_does_not_grow() {
        let mut table = ExpiringTable::with_capacity(3);
        table.update(domain("example.com", 100), 0);
        for _ in 0..5 {
            assert_eq!(
                table.update(domain("example.com", 100), 0),
                UpdateOutcome::Refreshed
            );
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_refresh_overwrites_expiry_and_resorts() {
        let mut table = full_table();
        assert_eq!(
            table.update(domain("a.example", 500), 0),
            UpdateOutcome::Refreshed
        );
        assert_eq!(table.as_slice()[0], domain("a.example", 500));
        assert_eq!(expiries(&table), vec![500, 200]);
    }

    #[test]
    fn test_new_entry_expired_on_arrival_is_dropped() {
        let mut table = ExpiringTable::with_capacity(2);
        assert_eq!(table.update(domain("x", 40), 40), UpdateOutcome::Expired);
        assert!(table.is_empty());
    }

    #[test]
    fn test_zero_lifetime_refresh_withdraws_on_trim() {
        let mut table = full_table();
        assert_eq!(table.update(domain("b.example", 50), 50), UpdateOutcome::Refreshed);
        assert_eq!(table.trim(50), 1);
        assert_eq!(table.as_slice(), &[domain("a.example", 100)]);
    }

    #[test]
    fn test_full_table_rejects_shorter_lived_entry() {
        let mut table = full_table();
        let before = table.as_slice().to_vec();
        assert_eq!(table.update(domain("c.example", 50), 0), UpdateOutcome::Rejected);
        assert_eq!(table.as_slice(), before.as_slice());
    }

    #[test]
    fn test_full_table_replaces_soonest_entry() {
        let mut table = full_table();
        assert_eq!(
            table.update(domain("c.example", 300), 0),
            UpdateOutcome::Replaced(domain("a.example", 100))
        );
        assert_eq!(expiries(&table), vec![300, 200]);
        assert!(table.iter().all(|d| d.name != "a.example"));
    }

    #[test]
    fn test_full_table_replaces_on_equal_expiry() {
        let mut table = full_table();
        assert_eq!(
            table.update(domain("c.example", 100), 0),
            UpdateOutcome::Replaced(domain("a.example", 100))
        );
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_trim_removes_only_expired_tail() {
        let mut table = full_table();
        table.update(domain("c.example", 300), 0);
        assert_eq!(table.trim(200), 1);
        assert_eq!(table.as_slice(), &[domain("c.example", 300)]);
        assert_eq!(table.trim(299), 0);
        assert_eq!(table.trim(1000), 1);
        assert!(table.is_empty());
        assert_eq!(table.soonest_expiry(), None);
    }

    #[test]
    fn test_trim_preserves_order_of_survivors() {
        let mut table = ExpiringTable::with_capacity(6);
        for (i, expiry) in [90, 10, 70, 30, 50, 20].into_iter().enumerate() {
            table.update(domain(&format!("d{}", i), expiry), 0);
        }
        table.trim(30);
        assert_eq!(expiries(&table), vec![90, 70, 50]);
    }

    #[test]
    fn test_link_local_servers_on_two_interfaces_are_distinct() {
        let ll: Ipv6Addr = "fe80::1".parse().unwrap();
        let mut table = ExpiringTable::with_capacity(3);
        assert_eq!(table.update(ServerEntry::new(ll, 2, 100), 0), UpdateOutcome::Inserted);
        assert_eq!(table.update(ServerEntry::new(ll, 3, 100), 0), UpdateOutcome::Inserted);
        assert_eq!(table.update(ServerEntry::new(ll, 3, 150), 0), UpdateOutcome::Refreshed);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_zero_capacity_admits_nothing() {
        let mut table = ExpiringTable::with_capacity(0);
        assert_eq!(table.update(domain("x", 10), 0), UpdateOutcome::Rejected);
        assert!(table.is_empty());
    }
}
