//! State owned by the worker task

use tracing::debug;

use crate::cache::{DomainEntry, ExpiringTable, ServerEntry, UpdateOutcome};
use crate::clock::Timestamp;
use crate::config::CacheConfig;
use crate::decode::NdEvent;

/// Whether the resolver configuration may be published yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No advertisement processed yet; nothing is written
    Waiting,
    /// At least one advertisement processed
    Ready,
}

/// Caches and clock reading owned by the worker
#[derive(Debug, Clone)]
pub struct DaemonState {
    servers: ExpiringTable<ServerEntry>,
    domains: ExpiringTable<DomainEntry>,
    now: Timestamp,
    state: WorkerState,
}

impl DaemonState {
    /// Create empty caches sized by `cache`
    pub fn new(cache: &CacheConfig) -> Self {
        Self {
            servers: ExpiringTable::with_capacity(cache.max_servers),
            domains: ExpiringTable::with_capacity(cache.max_domains),
            now: 0,
            state: WorkerState::Waiting,
        }
    }

    pub fn servers(&self) -> &ExpiringTable<ServerEntry> {
        &self.servers
    }

    pub fn domains(&self) -> &ExpiringTable<DomainEntry> {
        &self.domains
    }

    /// Time of the last [`DaemonState::tick`]
    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn worker_state(&self) -> WorkerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == WorkerState::Ready
    }

    /// Record the current time
    pub fn tick(&mut self, now: Timestamp) {
        self.now = now;
    }

    /// Apply decoded events and leave the waiting state
    pub fn apply(&mut self, events: Vec<NdEvent>) {
        let now = self.now;
        for event in events {
            match event {
                NdEvent::Server(server) => {
                    let label = server.to_string();
                    let expiry = server.expiry;
                    log_outcome("server", &label, expiry, self.servers.update(server, now));
                }
                NdEvent::Domain(domain) => {
                    let label = domain.name.clone();
                    let expiry = domain.expiry;
                    log_outcome("domain", &label, expiry, self.domains.update(domain, now));
                }
            }
        }
        self.state = WorkerState::Ready;
    }

    /// Drop expired entries from both caches
    pub fn trim(&mut self) {
        let servers = self.servers.trim(self.now);
        let domains = self.domains.trim(self.now);
        if servers + domains > 0 {
            debug!("Expired {} server(s) and {} domain(s)", servers, domains);
        }
    }

    /// Earliest expiry across both caches, `None` when both are empty
    pub fn next_expiry(&self) -> Option<Timestamp> {
        match (self.servers.soonest_expiry(), self.domains.soonest_expiry()) {
            (Some(s), Some(d)) => Some(s.min(d)),
            (s, d) => s.or(d),
        }
    }
}

fn log_outcome<T: std::fmt::Display>(
    kind: &str,
    label: &str,
    expiry: Timestamp,
    outcome: UpdateOutcome<T>,
) {
    match outcome {
        UpdateOutcome::Refreshed => debug!("Refreshed {} {} until {}", kind, label, expiry),
        UpdateOutcome::Inserted => debug!("Added {} {} until {}", kind, label, expiry),
        UpdateOutcome::Replaced(old) => {
            debug!("Added {} {} until {}, evicting {}", kind, label, expiry, old)
        }
        UpdateOutcome::Expired => debug!("Ignoring expired {} {}", kind, label),
        UpdateOutcome::Rejected => {
            debug!("No room for {} {}, every cached entry outlives it", kind, label)
        }
    }
}
