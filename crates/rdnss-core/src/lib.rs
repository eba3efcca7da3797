// # rdnss-core
//
// Core library for the Router Advertisement DNS configuration daemon.
//
// ## Architecture Overview
//
// The daemon learns recursive DNS servers and search domains from IPv6
// Router Advertisements (RFC 8106) and publishes them in resolv.conf format:
// - **PacketSource**: Trait for receiving advertisements (netlink or raw ICMPv6)
// - **decode**: Untrusted option parsing into server and domain updates
// - **ExpiringTable**: Bounded caches ordered by expiry
// - **Worker**: Owns the source and caches, publishes the resolver file
// - **Manager**: Runs the merge hook after every publication
// - **SourceRegistry**: Plugin-based registry of packet sources
//
// ## Design Principles
//
// 1. **Single owner**: Only the worker task mutates the caches
// 2. **Notify, don't share**: Worker and manager exchange a bare "changed" signal
// 3. **Fail stale**: A failed write keeps the previous configuration
// 4. **Parse unprivileged**: Privileges are dropped before the first packet

pub mod cache;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod decode;
pub mod error;
pub mod manager;
pub mod registry;
pub mod resolv;
pub mod sys;
pub mod traits;
pub mod worker;

// Re-export commonly used types
pub use cache::{DomainEntry, ExpiringTable, ServerEntry, UpdateOutcome};
pub use clock::{Clock, Timestamp};
pub use config::{CacheConfig, RdnssConfig, SourceSelection};
pub use daemon::Daemon;
pub use decode::NdEvent;
pub use error::{Error, Result};
pub use manager::{HookLauncher, Manager};
pub use registry::SourceRegistry;
pub use resolv::ResolvWriter;
pub use traits::{PacketSource, PacketSourceFactory};
pub use worker::{DaemonState, Worker, WorkerState};
