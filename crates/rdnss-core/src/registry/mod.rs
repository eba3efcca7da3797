//! Packet source registry
//!
//! Source crates register a factory at startup; the worker then opens the
//! first one that works on this host, or the one named in the configuration.
//!
//! ## Registration
//!
//! ```rust,ignore
//! // In rdnss-source-netlink
//! pub fn register(registry: &mut SourceRegistry) {
//!     registry.register(Box::new(NetlinkFactory));
//! }
//! ```
//!
//! Registration order is preference order: the kernel notification channel is
//! registered before the raw socket fallback.

use tracing::{info, warn};

use crate::config::SourceSelection;
use crate::error::{Error, Result};
use crate::traits::{PacketSource, PacketSourceFactory};

/// Ordered set of packet source factories
#[derive(Default)]
pub struct SourceRegistry {
    factories: Vec<Box<dyn PacketSourceFactory>>,
}

impl SourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory after the ones already registered
    ///
    /// A factory with the same name replaces the earlier registration in place.
    pub fn register(&mut self, factory: Box<dyn PacketSourceFactory>) {
        match self.factories.iter_mut().find(|f| f.name() == factory.name()) {
            Some(existing) => *existing = factory,
            None => self.factories.push(factory),
        }
    }

    /// Names of the registered sources, in preference order
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.name()).collect()
    }

    /// Check if no source is registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Open a packet source according to `selection`
    ///
    /// With [`SourceSelection::Auto`] every factory is tried in order and the
    /// first success wins. Otherwise only the named factory is tried.
    pub fn acquire(&self, selection: SourceSelection) -> Result<Box<dyn PacketSource>> {
        let candidates: Vec<&dyn PacketSourceFactory> = match selection.source_name() {
            None => self.factories.iter().map(|f| &**f).collect(),
            Some(name) => {
                let factory = self
                    .factories
                    .iter()
                    .find(|f| f.name() == name)
                    .ok_or_else(|| {
                        Error::source_unavailable(format!(
                            "source '{}' is not built into this daemon (available: {:?})",
                            name,
                            self.names()
                        ))
                    })?;
                vec![&**factory]
            }
        };

        let mut failures = Vec::new();
        for factory in candidates {
            match factory.acquire() {
                Ok(source) => {
                    info!("Using {} packet source", factory.name());
                    return Ok(source);
                }
                Err(e) => {
                    warn!("Cannot open {} packet source: {}", factory.name(), e);
                    failures.push(format!("{}: {}", factory.name(), e));
                }
            }
        }

        if failures.is_empty() {
            return Err(Error::source_unavailable("no packet source registered"));
        }
        Err(Error::source_unavailable(failures.join("; ")))
    }
}
