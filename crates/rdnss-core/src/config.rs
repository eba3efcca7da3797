//! Configuration types for the RDNSS daemon
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest accepted server table
pub const MAX_SERVERS_LIMIT: usize = 16;

/// Largest accepted search domain table
pub const MAX_DOMAINS_LIMIT: usize = 64;

/// Main daemon configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdnssConfig {
    /// Resolver configuration file to publish
    #[serde(default = "default_resolv_path")]
    pub resolv_path: PathBuf,

    /// Executable run after every resolver configuration update
    #[serde(default)]
    pub merge_hook: Option<PathBuf>,

    /// Account to switch to once the packet source is open
    ///
    /// `None` keeps the current user.
    #[serde(default = "default_username")]
    pub username: Option<String>,

    /// Which packet source to use
    #[serde(default)]
    pub source: SourceSelection,

    /// Cache sizing
    #[serde(default)]
    pub cache: CacheConfig,
}

impl RdnssConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            resolv_path: default_resolv_path(),
            merge_hook: None,
            username: default_username(),
            source: SourceSelection::default(),
            cache: CacheConfig::default(),
        }
    }

    /// Parse a JSON configuration document
    ///
    /// Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self, crate::Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.resolv_path.as_os_str().is_empty() {
            return Err(crate::Error::config("Resolver file path cannot be empty"));
        }

        if self.resolv_path.file_name().is_none() {
            return Err(crate::Error::config(format!(
                "Resolver file path {} does not name a file",
                self.resolv_path.display()
            )));
        }

        if let Some(hook) = &self.merge_hook {
            if hook.as_os_str().is_empty() {
                return Err(crate::Error::config("Merge hook path cannot be empty"));
            }
        }

        if let Some(user) = &self.username {
            if user.is_empty() {
                return Err(crate::Error::config(
                    "User name cannot be empty (omit it to keep the current user)",
                ));
            }
        }

        self.cache.validate()
    }
}

impl Default for RdnssConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Packet source selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSelection {
    /// First source that can be opened, in registration order
    #[default]
    Auto,
    /// Kernel netlink notifications (Linux)
    Netlink,
    /// Raw ICMPv6 socket
    Icmp,
}

impl SourceSelection {
    /// Registry name of the selected source, `None` for automatic selection
    pub fn source_name(&self) -> Option<&'static str> {
        match self {
            SourceSelection::Auto => None,
            SourceSelection::Netlink => Some("netlink"),
            SourceSelection::Icmp => Some("icmp"),
        }
    }
}

impl std::str::FromStr for SourceSelection {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(SourceSelection::Auto),
            "netlink" => Ok(SourceSelection::Netlink),
            "icmp" => Ok(SourceSelection::Icmp),
            other => Err(crate::Error::config(format!(
                "unknown packet source '{}' (expected auto, netlink or icmp)",
                other
            ))),
        }
    }
}

/// Cache sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached DNS servers
    #[serde(default = "default_max_servers")]
    pub max_servers: usize,

    /// Maximum number of cached search domains
    #[serde(default = "default_max_domains")]
    pub max_domains: usize,
}

impl CacheConfig {
    /// Validate the table sizes
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(1..=MAX_SERVERS_LIMIT).contains(&self.max_servers) {
            return Err(crate::Error::config(format!(
                "max_servers must be between 1 and {}, got {}",
                MAX_SERVERS_LIMIT, self.max_servers
            )));
        }
        if !(1..=MAX_DOMAINS_LIMIT).contains(&self.max_domains) {
            return Err(crate::Error::config(format!(
                "max_domains must be between 1 and {}, got {}",
                MAX_DOMAINS_LIMIT, self.max_domains
            )));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_servers: default_max_servers(),
            max_domains: default_max_domains(),
        }
    }
}

fn default_resolv_path() -> PathBuf {
    PathBuf::from("/var/run/rdnssd/resolv.conf")
}

fn default_username() -> Option<String> {
    Some("nobody".to_string())
}

/// Nameserver limit of the system resolver
fn default_max_servers() -> usize {
    3
}

/// Search list limit of the system resolver
fn default_max_domains() -> usize {
    6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RdnssConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.max_servers, 3);
        assert_eq!(config.cache.max_domains, 6);
        assert_eq!(config.username.as_deref(), Some("nobody"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = RdnssConfig::from_json_str(
            r#"{ "resolv_path": "/run/rdnssd/resolv.conf", "source": "icmp", "cache": { "max_domains": 10 } }"#,
        )
        .unwrap();
        assert_eq!(config.resolv_path, PathBuf::from("/run/rdnssd/resolv.conf"));
        assert_eq!(config.source, SourceSelection::Icmp);
        assert_eq!(config.cache.max_servers, 3);
        assert_eq!(config.cache.max_domains, 10);
        assert_eq!(config.merge_hook, None);
    }

    #[test]
    fn test_null_username_disables_drop() {
        let config = RdnssConfig::from_json_str(r#"{ "username": null }"#).unwrap();
        assert_eq!(config.username, None);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            RdnssConfig::from_json_str("{ nope"),
            Err(crate::Error::Json(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_sizes() {
        let mut config = RdnssConfig::default();
        config.cache.max_servers = 0;
        assert!(config.validate().is_err());

        config.cache.max_servers = 3;
        config.cache.max_domains = MAX_DOMAINS_LIMIT + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_paths() {
        let mut config = RdnssConfig::default();
        config.resolv_path = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = RdnssConfig::default();
        config.merge_hook = Some(PathBuf::new());
        assert!(config.validate().is_err());

        let mut config = RdnssConfig::default();
        config.username = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_source_selection_parse() {
        assert_eq!("NETLINK".parse::<SourceSelection>().unwrap(), SourceSelection::Netlink);
        assert_eq!("auto".parse::<SourceSelection>().unwrap().source_name(), None);
        assert!("pcap".parse::<SourceSelection>().is_err());
    }
}
