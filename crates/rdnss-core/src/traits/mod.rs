//! Core traits for the RDNSS daemon
//!
//! - [`PacketSource`]: Receive and decode Router Advertisement options
//! - [`PacketSourceFactory`]: Open a packet source at startup

pub mod packet_source;

pub use packet_source::{PacketSource, PacketSourceFactory};
