//! Advertisement worker
//!
//! The worker owns the packet source and both caches. It is the only task
//! that touches the network and the resolver configuration file.
//!
//! ## Loop
//!
//! ```text
//!        ┌──────────────────────────────────────────────┐
//!        ▼                                              │
//!   read clock ── ready? ── trim, render, publish, notify
//!        │                                              │
//!        ▼                                              │
//!   wait for: shutdown | packet | soonest expiry ───────┘
//! ```
//!
//! Nothing is written until the first advertisement has been processed, so
//! an empty file never replaces a configuration written by a previous run.
//! After that, every wake-up (packet or expiry) republishes the file.

mod state;

pub use state::{DaemonState, WorkerState};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::RdnssConfig;
use crate::error::Result;
use crate::registry::SourceRegistry;
use crate::resolv::{self, ResolvWriter};
use crate::sys;
use crate::traits::PacketSource;

/// Resolves an interface index to its name
pub type InterfaceNames = fn(u32) -> Option<String>;

/// Receives advertisements and maintains the resolver configuration
pub struct Worker {
    source: Box<dyn PacketSource>,
    state: DaemonState,
    clock: Clock,
    writer: ResolvWriter,
    notifier: mpsc::Sender<()>,
    shutdown: CancellationToken,
    interface_name: InterfaceNames,
}

impl Worker {
    /// Create a worker around an already opened source
    ///
    /// # Parameters
    ///
    /// - `source`: Packet source to read advertisements from
    /// - `config`: Daemon configuration (resolver path and cache sizes)
    /// - `notifier`: Sending half of the channel to the manager
    /// - `shutdown`: Stops the worker when cancelled
    pub fn new(
        source: Box<dyn PacketSource>,
        config: &RdnssConfig,
        notifier: mpsc::Sender<()>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            state: DaemonState::new(&config.cache),
            clock: Clock::new(),
            writer: ResolvWriter::new(&config.resolv_path),
            notifier,
            shutdown,
            interface_name: sys::interface_name,
        }
    }

    /// Open a packet source, then give up root privileges
    ///
    /// The source is acquired first because opening it may need privileges
    /// that the configured account does not have.
    pub fn start(
        registry: &SourceRegistry,
        config: &RdnssConfig,
        notifier: mpsc::Sender<()>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let source = registry.acquire(config.source)?;
        sys::drop_privileges(config.username.as_deref())?;
        Ok(Self::new(source, config, notifier, shutdown))
    }

    /// Use another interface name lookup for link-local servers
    pub fn with_interface_names(mut self, interface_name: InterfaceNames) -> Self {
        self.interface_name = interface_name;
        self
    }

    /// Current caches
    pub fn state(&self) -> &DaemonState {
        &self.state
    }

    /// Run until cancelled or until the source fails
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The shutdown token was cancelled
    /// - `Err(Error)`: The packet source failed
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Worker started with {} source, publishing to {}",
            self.source.name(),
            self.writer.path().display()
        );

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            self.state.tick(self.clock.now());

            if self.state.is_ready() {
                self.state.trim();
                self.publish().await;
            }

            let wake_at = self
                .state
                .next_expiry()
                .map(|expiry| self.clock.instant_at(expiry));

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    break;
                }

                received = self.source.receive_and_decode(&self.clock) => {
                    match received {
                        Ok(events) => {
                            debug!("Received {} option(s)", events.len());
                            self.state.tick(self.clock.now());
                            self.state.apply(events);
                        }
                        Err(e) if e.is_malformed() => {
                            warn!("Dropping malformed advertisement: {}", e);
                        }
                        Err(e) => {
                            error!("Packet source {} failed: {}", self.source.name(), e);
                            return Err(e);
                        }
                    }
                }

                _ = sleep_until(wake_at) => {
                    debug!("Cache entry lifetime elapsed");
                }
            }
        }

        info!("Worker stopped");
        Ok(())
    }

    /// Write the resolver configuration and wake the manager
    ///
    /// A failed write keeps the previous file; the manager is notified anyway.
    async fn publish(&mut self) {
        let document = resolv::render(
            self.state.servers(),
            self.state.domains(),
            self.interface_name,
        );

        if let Err(e) = self.writer.publish(&document).await {
            error!("{}", e);
        }

        match self.notifier.try_send(()) {
            Ok(()) => debug!("Notified manager"),
            Err(TrySendError::Full(())) => debug!("Manager notification already pending"),
            Err(TrySendError::Closed(())) => debug!("Manager is gone, not notifying"),
        }
    }
}

/// Sleep until `deadline`, or forever if there is none
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
