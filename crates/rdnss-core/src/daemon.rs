//! Daemon supervisor
//!
//! Wires a [`Worker`] and a [`Manager`] together over a one-slot notification
//! channel and runs them as two independent tasks.
//!
//! ## Shutdown
//!
//! Cancelling the shutdown token stops the manager. The supervisor then
//! stops the worker, waits for it and combines both results. If the manager
//! stops on its own (the worker closed the channel), the worker is stopped
//! the same way.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::RdnssConfig;
use crate::error::{Error, Result};
use crate::manager::{HookLauncher, Manager};
use crate::registry::SourceRegistry;
use crate::traits::PacketSource;
use crate::worker::Worker;

/// Pending notifications between worker and manager
///
/// A notification only says "something changed"; further ones sent while
/// one is pending are coalesced.
pub const NOTIFY_CAPACITY: usize = 1;

/// A worker and manager pair ready to run
pub struct Daemon {
    worker: Worker,
    manager: Manager,
    worker_stop: CancellationToken,
}

impl Daemon {
    /// Validate the configuration, open a packet source and drop privileges
    ///
    /// The merge hook launcher is spawned first, so the hook keeps the
    /// startup credentials.
    ///
    /// # Errors
    ///
    /// - `Error::Config`: Invalid configuration
    /// - `Error::SourceUnavailable`: No packet source could be opened
    /// - `Error::Privileges`: The configured account could not be assumed
    /// - `Error::Hook`: The merge hook launcher could not be started
    pub fn start(
        config: &RdnssConfig,
        registry: &SourceRegistry,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;

        let hook = spawn_launcher(config)?;
        let (tx, rx) = mpsc::channel(NOTIFY_CAPACITY);
        let worker_stop = shutdown.child_token();
        let worker = Worker::start(registry, config, tx, worker_stop.clone())?;
        let manager = Manager::new(hook, rx, shutdown);

        Ok(Self {
            worker,
            manager,
            worker_stop,
        })
    }

    /// Assemble a daemon around an already opened source
    ///
    /// No privileges are dropped.
    pub fn with_source(
        source: Box<dyn PacketSource>,
        config: &RdnssConfig,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;

        let hook = spawn_launcher(config)?;
        let (tx, rx) = mpsc::channel(NOTIFY_CAPACITY);
        let worker_stop = shutdown.child_token();
        let worker = Worker::new(source, config, tx, worker_stop.clone());
        let manager = Manager::new(hook, rx, shutdown);

        Ok(Self {
            worker,
            manager,
            worker_stop,
        })
    }

    /// Replace the worker's interface name lookup
    pub fn with_interface_names(mut self, interface_name: crate::worker::InterfaceNames) -> Self {
        self.worker = self.worker.with_interface_names(interface_name);
        self
    }

    /// Run both tasks to completion
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: The worker's error if it failed, otherwise the manager's
    pub async fn run(self) -> Result<()> {
        let worker = tokio::spawn(self.worker.run());
        let manager = tokio::spawn(self.manager.run());

        let manager_result = manager.await.map_err(Error::from).and_then(|r| r);
        debug!("Manager finished, stopping worker");

        self.worker_stop.cancel();
        let worker_result = worker.await.map_err(Error::from).and_then(|r| r);

        info!("Daemon stopped");
        worker_result.and(manager_result)
    }
}

fn spawn_launcher(config: &RdnssConfig) -> Result<Option<HookLauncher>> {
    config
        .merge_hook
        .as_deref()
        .map(HookLauncher::spawn)
        .transpose()
}

/// Start and run the daemon until `shutdown` is cancelled
pub async fn run(
    config: &RdnssConfig,
    registry: &SourceRegistry,
    shutdown: CancellationToken,
) -> Result<()> {
    Daemon::start(config, registry, shutdown)?.run().await
}
