// # Netlink Packet Source
//
// Receives Router Advertisement options from the Linux kernel instead of
// the network. The kernel forwards the ND options it does not handle itself
// (RDNSS, DNSSL) to the RTNLGRP_ND_USEROPT multicast group as
// RTM_NEWNDUSEROPT messages, so no raw socket and no ICMPv6 parsing is
// needed.
//
// ## Message Layout
//
// ```text
// nlmsghdr (16 bytes)
// nduseroptmsg (16 bytes):
//   family u8 | pad u8 | opts_len u16 | ifindex i32 | icmp_type u8 | icmp_code u8 | pad
// ND options (opts_len bytes)
// ```
//
// ## Platform Support
//
// Netlink is Linux-only. On other platforms the factory always fails, so the
// registry falls back to the next source.

use rdnss_core::{PacketSourceFactory, Result, SourceRegistry};

#[cfg(not(target_os = "linux"))]
use rdnss_core::Error;

#[cfg(target_os = "linux")]
pub use linux::{NetlinkSource, decode_messages};

/// Netlink message type carrying ND user options
pub const RTM_NEWNDUSEROPT: u16 = 68;

/// Multicast group of ND user option notifications
pub const RTNLGRP_ND_USEROPT: u32 = 20;

/// Size of `struct nduseroptmsg`
pub const NDUSEROPT_HEADER_LEN: usize = 16;

#[cfg(target_os = "linux")]
mod linux {
    use std::io;
    use std::os::fd::AsRawFd;

    use netlink_packet_core::NetlinkBuffer;
    use netlink_sys::{Socket, SocketAddr, protocols::NETLINK_ROUTE};
    use tokio::io::unix::AsyncFd;
    use tracing::{debug, warn};

    use rdnss_core::clock::{Clock, Timestamp};
    use rdnss_core::decode::{self, NdEvent};
    use rdnss_core::{Error, PacketSource, Result, sys};

    use super::{NDUSEROPT_HEADER_LEN, RTM_NEWNDUSEROPT, RTNLGRP_ND_USEROPT};

    const ND_ROUTER_ADVERT: u8 = 134;

    /// Netlink route socket subscribed to ND user options
    pub struct NetlinkSource {
        socket: AsyncFd<Socket>,
    }

    impl NetlinkSource {
        /// Open and subscribe the socket
        ///
        /// Must be called from within a Tokio runtime.
        pub fn open() -> Result<Self> {
            let mut socket = Socket::new(NETLINK_ROUTE)?;
            socket.bind(&SocketAddr::new(0, 0))?;
            socket.add_membership(RTNLGRP_ND_USEROPT)?;
            socket.set_non_blocking(true)?;
            sys::prepare_fd(socket.as_raw_fd())?;

            Ok(Self {
                socket: AsyncFd::new(socket)?,
            })
        }
    }

    #[async_trait::async_trait]
    impl PacketSource for NetlinkSource {
        fn name(&self) -> &'static str {
            "netlink"
        }

        async fn receive_and_decode(&mut self, clock: &Clock) -> Result<Vec<NdEvent>> {
            loop {
                let mut guard = self.socket.readable().await?;

                let received = match guard.try_io(|socket| socket.get_ref().recv_from_full()) {
                    Ok(received) => received,
                    Err(_would_block) => continue,
                };

                let (buf, from) = match received {
                    Ok(received) => received,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                };

                if from.port_number() != 0 {
                    debug!("Ignoring netlink message from port {}", from.port_number());
                    continue;
                }

                let mut events = Vec::new();
                if let Err(e) = decode_messages(&buf, clock.now(), &mut events) {
                    warn!("Dropping netlink datagram: {}", e);
                }
                return Ok(events);
            }
        }
    }

    /// Decode every ND user option message in a netlink datagram
    ///
    /// Messages of other types, other families or for other ICMPv6 messages
    /// are skipped. A broken netlink header aborts the walk; events decoded
    /// from earlier messages are kept.
    pub fn decode_messages(buf: &[u8], now: Timestamp, events: &mut Vec<NdEvent>) -> Result<()> {
        let mut offset = 0;

        while offset < buf.len() {
            let msg = NetlinkBuffer::new_checked(&buf[offset..])
                .map_err(|e| Error::malformed(format!("netlink header: {}", e)))?;
            let len = msg.length() as usize;

            if msg.message_type() == RTM_NEWNDUSEROPT {
                if let Err(e) = decode_useropt(msg.payload(), now, events) {
                    warn!("Ignoring ND user option message: {}", e);
                }
            } else {
                debug!("Skipping netlink message type {}", msg.message_type());
            }

            // NLMSG_ALIGN
            offset += (len + 3) & !3;
        }

        Ok(())
    }

    fn decode_useropt(payload: &[u8], now: Timestamp, events: &mut Vec<NdEvent>) -> Result<()> {
        if payload.len() < NDUSEROPT_HEADER_LEN {
            return Err(Error::malformed(format!(
                "nduseroptmsg of {} bytes is truncated",
                payload.len()
            )));
        }

        let family = payload[0];
        let opts_len = usize::from(u16::from_ne_bytes([payload[2], payload[3]]));
        let ifindex = i32::from_ne_bytes([payload[4], payload[5], payload[6], payload[7]]);
        let (icmp_type, icmp_code) = (payload[8], payload[9]);

        if i32::from(family) != libc::AF_INET6 || icmp_type != ND_ROUTER_ADVERT || icmp_code != 0 {
            debug!(
                "Skipping user option for family {} ICMPv6 {}/{}",
                family, icmp_type, icmp_code
            );
            return Ok(());
        }

        let options = payload
            .get(NDUSEROPT_HEADER_LEN..NDUSEROPT_HEADER_LEN + opts_len)
            .ok_or_else(|| {
                Error::malformed(format!(
                    "{} option bytes declared, {} present",
                    opts_len,
                    payload.len() - NDUSEROPT_HEADER_LEN
                ))
            })?;
        let ifindex = u32::try_from(ifindex)
            .map_err(|_| Error::malformed(format!("invalid interface index {}", ifindex)))?;

        decode::decode_options(options, ifindex, now, events)
    }
}

/// Factory for netlink packet sources
pub struct NetlinkFactory;

#[cfg(target_os = "linux")]
impl PacketSourceFactory for NetlinkFactory {
    fn name(&self) -> &'static str {
        "netlink"
    }

    fn acquire(&self) -> Result<Box<dyn rdnss_core::PacketSource>> {
        Ok(Box::new(NetlinkSource::open()?))
    }
}

#[cfg(not(target_os = "linux"))]
impl PacketSourceFactory for NetlinkFactory {
    fn name(&self) -> &'static str {
        "netlink"
    }

    fn acquire(&self) -> Result<Box<dyn rdnss_core::PacketSource>> {
        Err(Error::source_unavailable(
            "netlink ND user options are only supported on Linux",
        ))
    }
}

/// Register the netlink packet source with a registry
pub fn register(registry: &mut SourceRegistry) {
    registry.register(Box::new(NetlinkFactory));
}
