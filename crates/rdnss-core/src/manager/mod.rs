//! Merge hook manager
//!
//! Waits for "configuration changed" notifications from the worker and runs
//! the merge hook once per notification. Notifications carry no data; a
//! burst of updates while the hook is running collapses into one more run.
//!
//! The hook itself is started by a [`HookLauncher`], so it keeps the
//! credentials the daemon had before the worker dropped them.

mod launcher;

pub use launcher::HookLauncher;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Runs the merge hook when the worker publishes a new configuration
pub struct Manager {
    hook: Option<HookLauncher>,
    notifications: mpsc::Receiver<()>,
    shutdown: CancellationToken,
}

impl Manager {
    /// Create a manager
    ///
    /// # Parameters
    ///
    /// - `hook`: Launcher of the hook to run after each update, if any
    /// - `notifications`: Receiving half of the channel from the worker
    /// - `shutdown`: Stops the manager when cancelled
    pub fn new(
        hook: Option<HookLauncher>,
        notifications: mpsc::Receiver<()>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            hook,
            notifications,
            shutdown,
        }
    }

    /// Run until cancelled or until the worker goes away
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The shutdown token was cancelled
    /// - `Err(Error::Channel)`: The worker closed the channel while the
    ///   daemon was still supposed to be running
    pub async fn run(mut self) -> Result<()> {
        match &self.hook {
            Some(launcher) => info!("Manager started, merge hook {}", launcher.hook().display()),
            None => info!("Manager started without merge hook"),
        }

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    break;
                }

                notification = self.notifications.recv() => {
                    match notification {
                        Some(()) => self.on_update().await,
                        None if self.shutdown.is_cancelled() => break,
                        None => {
                            error!("Worker closed the notification channel");
                            return Err(Error::channel("worker closed the notification channel"));
                        }
                    }
                }
            }
        }

        info!("Manager stopped");
        Ok(())
    }

    async fn on_update(&mut self) {
        let Some(launcher) = &mut self.hook else {
            debug!("Resolver configuration updated");
            return;
        };

        match launcher.run().await {
            Ok(0) => debug!("Merge hook {} succeeded", launcher.hook().display()),
            Ok(code) => warn!(
                "Merge hook {} exited with status {}",
                launcher.hook().display(),
                code
            ),
            Err(e) => error!("{}", e),
        }
    }
}
