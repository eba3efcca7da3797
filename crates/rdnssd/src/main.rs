// # rdnssd - Router Advertisement DNS Daemon
//
// The rdnssd daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering packet sources
// 4. Running the daemon until SIGTERM or SIGINT
//
// All RDNSS logic lives in rdnss-core.
//
// ## Configuration
//
// - `RDNSSD_CONFIG_FILE`: JSON configuration file, loaded first (optional)
// - `RDNSSD_RESOLV_FILE`: Resolver file to publish
// - `RDNSSD_MERGE_HOOK`: Executable run after each update
// - `RDNSSD_USER`: Account to switch to; empty keeps the current user
// - `RDNSSD_SOURCE`: Packet source (auto, netlink, icmp)
// - `RDNSSD_MAX_SERVERS`: Cached DNS servers (1-16)
// - `RDNSSD_MAX_DOMAINS`: Cached search domains (1-64)
// - `RDNSSD_LOG_LEVEL`: trace, debug, info, warn or error
//
// ## Example
//
// ```bash
// export RDNSSD_RESOLV_FILE=/run/rdnssd/resolv.conf
// export RDNSSD_MERGE_HOOK=/etc/rdnssd/merge-hook
//
// rdnssd
// ```

use anyhow::{Context, Result};
use rdnss_core::{Daemon, RdnssConfig, SourceRegistry};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Time allowed for the worker and manager to stop after a signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RdnssExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (source failure, worker or manager died)
    RuntimeError = 2,
}

impl From<RdnssExitCode> for ExitCode {
    fn from(code: RdnssExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application settings
#[derive(Debug)]
struct Settings {
    config: RdnssConfig,
    log_level: String,
}

impl Settings {
    /// Load settings through `lookup`, normally the process environment
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("RDNSSD_CONFIG_FILE") {
            Some(path) => RdnssConfig::from_json_file(&path)
                .with_context(|| format!("RDNSSD_CONFIG_FILE {}", path))?,
            None => RdnssConfig::default(),
        };

        if let Some(path) = lookup("RDNSSD_RESOLV_FILE") {
            config.resolv_path = PathBuf::from(path);
        }
        if let Some(hook) = lookup("RDNSSD_MERGE_HOOK") {
            config.merge_hook = Some(PathBuf::from(hook));
        }
        if let Some(user) = lookup("RDNSSD_USER") {
            config.username = (!user.is_empty()).then_some(user);
        }
        if let Some(source) = lookup("RDNSSD_SOURCE") {
            config.source = source.parse().context("RDNSSD_SOURCE")?;
        }
        if let Some(max) = lookup("RDNSSD_MAX_SERVERS") {
            config.cache.max_servers = max
                .parse()
                .with_context(|| format!("RDNSSD_MAX_SERVERS '{}' is not a number", max))?;
        }
        if let Some(max) = lookup("RDNSSD_MAX_DOMAINS") {
            config.cache.max_domains = max
                .parse()
                .with_context(|| format!("RDNSSD_MAX_DOMAINS '{}' is not a number", max))?;
        }

        Ok(Self {
            config,
            log_level: lookup("RDNSSD_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the settings
    fn validate(&self) -> Result<()> {
        self.config.validate()?;
        self.level()?;
        Ok(())
    }

    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "RDNSSD_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let settings = match Settings::from_lookup(|key| env::var(key).ok()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return RdnssExitCode::ConfigError.into();
        }
    };

    if let Err(e) = settings.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return RdnssExitCode::ConfigError.into();
    }

    let log_level = settings.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return RdnssExitCode::ConfigError.into();
    }

    info!("Starting rdnssd daemon");
    info!(
        "Publishing to {}, keeping up to {} server(s) and {} domain(s)",
        settings.config.resolv_path.display(),
        settings.config.cache.max_servers,
        settings.config.cache.max_domains
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RdnssExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(settings.config)).into()
}

/// Build the source registry from the compiled-in sources
///
/// Registration order is preference order.
fn source_registry() -> SourceRegistry {
    #[allow(unused_mut)]
    let mut registry = SourceRegistry::new();

    #[cfg(feature = "netlink")]
    rdnss_source_netlink::register(&mut registry);

    #[cfg(feature = "icmp")]
    rdnss_source_icmp::register(&mut registry);

    registry
}

/// Run the daemon
async fn run_daemon(config: RdnssConfig) -> RdnssExitCode {
    let registry = source_registry();
    info!("Packet sources: {:?}", registry.names());

    let shutdown = CancellationToken::new();

    let daemon = match Daemon::start(&config, &registry, shutdown.clone()) {
        Ok(daemon) => daemon,
        Err(e) => {
            error!("Startup failed: {}", e);
            return RdnssExitCode::ConfigError;
        }
    };

    let mut handle = tokio::spawn(daemon.run());

    let result = tokio::select! {
        result = &mut handle => result,
        signal = wait_for_shutdown() => {
            match signal {
                Ok(name) => info!("Received shutdown signal: {}", name),
                Err(e) => error!("Signal handling failed: {:#}", e),
            }
            shutdown.cancel();

            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(result) => result,
                Err(_) => {
                    error!("Shutdown timeout after {:?}", SHUTDOWN_GRACE);
                    handle.abort();
                    return RdnssExitCode::RuntimeError;
                }
            }
        }
    };

    match result {
        Ok(Ok(())) => {
            info!("Shutting down daemon");
            RdnssExitCode::CleanShutdown
        }
        Ok(Err(e)) => {
            error!("Daemon error: {}", e);
            RdnssExitCode::RuntimeError
        }
        Err(e) => {
            error!("Daemon task failed: {}", e);
            RdnssExitCode::RuntimeError
        }
    }
}

/// Wait for a shutdown signal (SIGTERM, SIGINT)
///
/// # Returns
///
/// The name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for a shutdown signal (CTRL-C only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdnss_core::SourceSelection;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.config, RdnssConfig::default());
        assert_eq!(settings.level().unwrap(), Level::INFO);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("RDNSSD_RESOLV_FILE", "/run/rdnssd/resolv.conf"),
            ("RDNSSD_MERGE_HOOK", "/etc/rdnssd/merge-hook"),
            ("RDNSSD_USER", ""),
            ("RDNSSD_SOURCE", "icmp"),
            ("RDNSSD_MAX_SERVERS", "5"),
            ("RDNSSD_MAX_DOMAINS", "8"),
            ("RDNSSD_LOG_LEVEL", "DEBUG"),
        ])
        .unwrap();

        assert_eq!(settings.config.resolv_path, PathBuf::from("/run/rdnssd/resolv.conf"));
        assert_eq!(
            settings.config.merge_hook,
            Some(PathBuf::from("/etc/rdnssd/merge-hook"))
        );
        assert_eq!(settings.config.username, None);
        assert_eq!(settings.config.source, SourceSelection::Icmp);
        assert_eq!(settings.config.cache.max_servers, 5);
        assert_eq!(settings.config.cache.max_domains, 8);
        assert_eq!(settings.level().unwrap(), Level::DEBUG);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_config_file_then_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rdnssd.json");
        std::fs::write(
            &path,
            r#"{ "resolv_path": "/tmp/resolv.conf", "username": "rdnssd", "cache": { "max_servers": 4 } }"#,
        )
        .unwrap();

        let settings = settings(&[
            ("RDNSSD_CONFIG_FILE", path.to_str().unwrap()),
            ("RDNSSD_MAX_SERVERS", "2"),
        ])
        .unwrap();

        assert_eq!(settings.config.resolv_path, PathBuf::from("/tmp/resolv.conf"));
        assert_eq!(settings.config.username.as_deref(), Some("rdnssd"));
        assert_eq!(settings.config.cache.max_servers, 2);
        assert_eq!(settings.config.cache.max_domains, 6);
    }

    #[test]
    fn test_invalid_values() {
        assert!(settings(&[("RDNSSD_SOURCE", "pcap")]).is_err());
        assert!(settings(&[("RDNSSD_MAX_SERVERS", "three")]).is_err());
        assert!(settings(&[("RDNSSD_CONFIG_FILE", "/nonexistent/rdnssd.json")]).is_err());

        let settings_out_of_range = settings(&[("RDNSSD_MAX_DOMAINS", "65")]).unwrap();
        assert!(settings_out_of_range.validate().is_err());

        let bad_level = settings(&[("RDNSSD_LOG_LEVEL", "verbose")]).unwrap();
        assert!(bad_level.validate().is_err());
    }

    #[test]
    fn test_registry_order() {
        let names = source_registry().names();
        #[cfg(all(feature = "netlink", feature = "icmp"))]
        assert_eq!(names, vec!["netlink", "icmp"]);
        #[cfg(not(any(feature = "netlink", feature = "icmp")))]
        assert!(names.is_empty());
    }
}
