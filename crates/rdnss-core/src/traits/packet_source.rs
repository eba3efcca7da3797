// # Packet Source Trait
//
// Defines the interface for receiving Router Advertisement options.
//
// ## Implementations
//
// - Netlink-based (Linux): `rdnss-source-netlink` crate
// - Raw ICMPv6 socket (fallback): `rdnss-source-icmp` crate
//
// ## Usage
//
// ```rust,ignore
// use rdnss_core::{Clock, PacketSourceFactory};
//
// let source = factory.acquire()?;
// let clock = Clock::new();
// loop {
//     let events = source.receive_and_decode(&clock).await?;
//     println!("{} updates", events.len());
// }
// ```

use async_trait::async_trait;

use crate::clock::Clock;
use crate::decode::NdEvent;

/// A handle that yields decoded Router Advertisement options
///
/// # Trust Level: Semi-Trusted
///
/// Sources read untrusted data from the network. They:
/// - own exactly one descriptor, non-blocking and close-on-exec
/// - decode options with [`crate::decode::decode_options`], reading the
///   clock when the packet arrives
/// - log and drop malformed packets themselves
///
/// They must not touch the caches, write files or decide when to publish;
/// that is the worker's job.
#[async_trait]
pub trait PacketSource: Send {
    /// Short name for logs ("netlink", "icmp")
    fn name(&self) -> &'static str;

    /// Wait for the next advertisement and decode it
    ///
    /// # Returns
    ///
    /// - `Ok(events)`: Updates from the received packet(s); may be empty if
    ///   the packet carried no usable option
    /// - `Err(Error)`: Unrecoverable I/O failure on the descriptor
    ///
    /// # Cancellation
    ///
    /// The future must be safe to drop at any await point without losing a
    /// packet that has already been read.
    async fn receive_and_decode(&mut self, clock: &Clock) -> Result<Vec<NdEvent>, crate::Error>;
}

/// Opens a [`PacketSource`]
pub trait PacketSourceFactory: Send + Sync {
    /// Registry name of the source
    fn name(&self) -> &'static str;

    /// Open the underlying descriptor
    ///
    /// Fails when the platform or the current privileges do not allow this
    /// kind of source; the registry then tries the next one.
    fn acquire(&self) -> Result<Box<dyn PacketSource>, crate::Error>;
}
