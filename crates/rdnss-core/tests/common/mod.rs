//! Test doubles and common utilities for daemon contract tests
//!
//! The controlled source is fed raw option areas by the test, so packets go
//! through the real decoder on their way to the worker.

#![allow(dead_code)]

use std::net::Ipv6Addr;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rdnss_core::decode::{self, ND_OPT_DNSSL, ND_OPT_RDNSS, NdEvent};
use rdnss_core::error::{Error, Result};
use rdnss_core::{CacheConfig, Clock, PacketSource, PacketSourceFactory, RdnssConfig};
use tokio::sync::mpsc;

/// Interface index used for every packet of the controlled source
pub const TEST_IFINDEX: u32 = 2;

/// A packet source that yields option areas sent by the test
///
/// Dropping every [`PacketFeed`] makes the source fail, like a closed socket.
pub struct ControlledSource {
    packets: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Sending side of a [`ControlledSource`]
#[derive(Clone)]
pub struct PacketFeed {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ControlledSource {
    pub fn new() -> (Self, PacketFeed) {
        let (tx, packets) = mpsc::unbounded_channel();
        (Self { packets }, PacketFeed { tx })
    }
}

impl PacketFeed {
    /// Deliver one advertisement option area
    pub fn send(&self, options: Vec<u8>) {
        let _ = self.tx.send(options);
    }
}

#[async_trait::async_trait]
impl PacketSource for ControlledSource {
    fn name(&self) -> &'static str {
        "controlled"
    }

    async fn receive_and_decode(&mut self, clock: &Clock) -> Result<Vec<NdEvent>> {
        let options = self.packets.recv().await.ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "packet feed closed",
            ))
        })?;

        let mut events = Vec::new();
        decode::decode_options(&options, TEST_IFINDEX, clock.now(), &mut events)?;
        Ok(events)
    }
}

/// Hands out one controlled source
pub struct ControlledFactory {
    source: Mutex<Option<ControlledSource>>,
}

impl ControlledFactory {
    pub fn new() -> (Self, PacketFeed) {
        let (source, feed) = ControlledSource::new();
        let factory = Self {
            source: Mutex::new(Some(source)),
        };
        (factory, feed)
    }
}

impl PacketSourceFactory for ControlledFactory {
    fn name(&self) -> &'static str {
        "netlink"
    }

    fn acquire(&self) -> Result<Box<dyn PacketSource>> {
        self.source
            .lock()
            .unwrap()
            .take()
            .map(|s| Box::new(s) as Box<dyn PacketSource>)
            .ok_or_else(|| Error::source_unavailable("already acquired"))
    }
}

/// A factory that never works, like a raw socket without privileges
pub struct FailingFactory {
    pub name: &'static str,
}

impl PacketSourceFactory for FailingFactory {
    fn name(&self) -> &'static str {
        self.name
    }

    fn acquire(&self) -> Result<Box<dyn PacketSource>> {
        Err(Error::Io(std::io::Error::from(
            std::io::ErrorKind::PermissionDenied,
        )))
    }
}

/// Configuration publishing into `dir`, without privilege drop
pub fn test_config(dir: &Path) -> RdnssConfig {
    RdnssConfig {
        resolv_path: dir.join("resolv.conf"),
        merge_hook: None,
        username: None,
        source: Default::default(),
        cache: CacheConfig {
            max_servers: 3,
            max_domains: 6,
        },
    }
}

/// Interface names for tests; only [`TEST_IFINDEX`] exists
pub fn test_interface_names(ifindex: u32) -> Option<String> {
    (ifindex == TEST_IFINDEX).then(|| "eth0".to_string())
}

/// No interface exists
pub fn no_interfaces(_ifindex: u32) -> Option<String> {
    None
}

/// RDNSS option carrying `addrs`
pub fn rdnss_option(lifetime: u32, addrs: &[&str]) -> Vec<u8> {
    let mut opt = vec![ND_OPT_RDNSS, (1 + 2 * addrs.len()) as u8, 0, 0];
    opt.extend_from_slice(&lifetime.to_be_bytes());
    for addr in addrs {
        let addr: Ipv6Addr = addr.parse().unwrap();
        opt.extend_from_slice(&addr.octets());
    }
    opt
}

/// DNSSL option carrying `names`
pub fn dnssl_option(lifetime: u32, names: &[&str]) -> Vec<u8> {
    let mut body = Vec::new();
    for name in names {
        for label in name.split('.') {
            body.push(label.len() as u8);
            body.extend_from_slice(label.as_bytes());
        }
        body.push(0);
    }
    while body.len() % 8 != 0 {
        body.push(0);
    }

    let mut opt = vec![ND_OPT_DNSSL, (1 + body.len() / 8) as u8, 0, 0];
    opt.extend_from_slice(&lifetime.to_be_bytes());
    opt.extend_from_slice(&body);
    opt
}

/// Poll `path` until its content satisfies `accept`
///
/// Returns the accepted content, or `None` after `timeout`.
pub async fn wait_for_file<F>(path: &Path, timeout: Duration, accept: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(content) = tokio::fs::read_to_string(path).await {
            if accept(&content) {
                return Some(content);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Number of lines in `path`, 0 if it does not exist
pub fn line_count(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .map(|c| c.lines().count())
        .unwrap_or(0)
}
