// # Raw ICMPv6 Packet Source
//
// Fallback source for kernels without netlink ND user option support. Reads
// Router Advertisements from a raw ICMPv6 socket and decodes the option
// area itself. Opening the socket needs CAP_NET_RAW, which is why privileges
// are dropped only after the source has been acquired.
//
// ## Validation
//
// - Only type 134 code 0 messages of at least 16 bytes are considered
// - The sender must be link-local, as routers always advertise from one
// - The interface is the scope of the sender address

use rdnss_core::decode::{self, NdEvent};
use rdnss_core::{Error, PacketSourceFactory, Result, SourceRegistry, Timestamp};

#[cfg(unix)]
pub use raw::IcmpSource;

/// ICMPv6 type of a Router Advertisement
pub const ND_ROUTER_ADVERT: u8 = 134;

/// Fixed part of a Router Advertisement, before the options
pub const ROUTER_ADVERT_LEN: usize = 16;

/// Decode the options of one ICMPv6 Router Advertisement
///
/// # Parameters
///
/// - `packet`: ICMPv6 message, without IPv6 header
/// - `ifindex`: Interface the message arrived on
/// - `now`: Reception time
/// - `events`: Output for decoded events
///
/// # Errors
///
/// `Error::MalformedOption` if the packet is not a Router Advertisement or
/// its option area is broken. Events decoded before the error are kept.
pub fn decode_advertisement(
    packet: &[u8],
    ifindex: u32,
    now: Timestamp,
    events: &mut Vec<NdEvent>,
) -> Result<()> {
    if packet.len() < ROUTER_ADVERT_LEN {
        return Err(Error::malformed(format!(
            "ICMPv6 message of {} bytes is too short for a router advertisement",
            packet.len()
        )));
    }
    if packet[0] != ND_ROUTER_ADVERT || packet[1] != 0 {
        return Err(Error::malformed(format!(
            "ICMPv6 message {}/{} is not a router advertisement",
            packet[0], packet[1]
        )));
    }

    decode::decode_options(&packet[ROUTER_ADVERT_LEN..], ifindex, now, events)
}

#[cfg(unix)]
mod raw {
    use std::io;
    use std::mem;
    use std::net::Ipv6Addr;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    use tokio::io::unix::AsyncFd;
    use tracing::{debug, warn};

    use rdnss_core::clock::Clock;
    use rdnss_core::decode::NdEvent;
    use rdnss_core::{PacketSource, Result, sys};

    use super::decode_advertisement;

    const RECV_BUFFER_LEN: usize = 65536;

    /// Raw ICMPv6 socket receiving Router Advertisements
    pub struct IcmpSource {
        socket: AsyncFd<OwnedFd>,
        buf: Vec<u8>,
    }

    impl IcmpSource {
        /// Open the raw socket
        ///
        /// Must be called from within a Tokio runtime.
        pub fn open() -> Result<Self> {
            // SAFETY: plain socket(2) call, the result is checked below
            let fd = unsafe { libc::socket(libc::AF_INET6, libc::SOCK_RAW, libc::IPPROTO_ICMPV6) };
            if fd < 0 {
                return Err(io::Error::last_os_error().into());
            }
            // SAFETY: fd is a freshly created descriptor owned by nobody else
            let fd = unsafe { OwnedFd::from_raw_fd(fd) };

            sys::prepare_fd(fd.as_raw_fd())?;
            pass_router_advertisements_only(&fd)?;

            Ok(Self {
                socket: AsyncFd::new(fd)?,
                buf: vec![0; RECV_BUFFER_LEN],
            })
        }
    }

    #[async_trait::async_trait]
    impl PacketSource for IcmpSource {
        fn name(&self) -> &'static str {
            "icmp"
        }

        async fn receive_and_decode(&mut self, clock: &Clock) -> Result<Vec<NdEvent>> {
            loop {
                let mut guard = self.socket.readable().await?;

                let received = match guard.try_io(|fd| recv_from(fd.get_ref(), &mut self.buf)) {
                    Ok(received) => received,
                    Err(_would_block) => continue,
                };

                let (len, from, ifindex) = match received {
                    Ok(received) => received,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                };

                if !from.is_unicast_link_local() {
                    debug!("Ignoring ICMPv6 message from non link-local {}", from);
                    continue;
                }

                let mut events = Vec::new();
                if let Err(e) =
                    decode_advertisement(&self.buf[..len], ifindex, clock.now(), &mut events)
                {
                    if events.is_empty() {
                        debug!("Dropping ICMPv6 message from {}: {}", from, e);
                        continue;
                    }
                    warn!(
                        "Keeping {} option(s) before error in advertisement from {}: {}",
                        events.len(),
                        from,
                        e
                    );
                }
                return Ok(events);
            }
        }
    }

    fn recv_from(fd: &OwnedFd, buf: &mut [u8]) -> io::Result<(usize, Ipv6Addr, u32)> {
        // SAFETY: sockaddr_in6 is plain old data
        let mut addr: libc::sockaddr_in6 = unsafe { mem::zeroed() };
        let mut addr_len = mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;

        // SAFETY: buf and addr are valid for writes of the lengths passed
        let n = unsafe {
            libc::recvfrom(
                fd.as_raw_fd(),
                buf.as_mut_ptr().cast(),
                buf.len(),
                0,
                (&mut addr as *mut libc::sockaddr_in6).cast(),
                &mut addr_len,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok((
            n as usize,
            Ipv6Addr::from(addr.sin6_addr.s6_addr),
            addr.sin6_scope_id,
        ))
    }

    /// Install an ICMP6_FILTER passing only router advertisements
    #[cfg(target_os = "linux")]
    fn pass_router_advertisements_only(fd: &OwnedFd) -> io::Result<()> {
        const ICMP6_FILTER: libc::c_int = 1;

        // Linux semantics: a set bit blocks the type
        let mut filter = [u32::MAX; 8];
        let kind = usize::from(super::ND_ROUTER_ADVERT);
        filter[kind >> 5] &= !(1 << (kind & 31));

        // SAFETY: filter outlives the call and its size is passed along
        let rc = unsafe {
            libc::setsockopt(
                fd.as_raw_fd(),
                libc::IPPROTO_ICMPV6,
                ICMP6_FILTER,
                filter.as_ptr().cast(),
                mem::size_of_val(&filter) as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Other systems rely on the type check in the decoder
    #[cfg(not(target_os = "linux"))]
    fn pass_router_advertisements_only(_fd: &OwnedFd) -> io::Result<()> {
        Ok(())
    }
}

/// Factory for raw ICMPv6 packet sources
pub struct IcmpFactory;

#[cfg(unix)]
impl PacketSourceFactory for IcmpFactory {
    fn name(&self) -> &'static str {
        "icmp"
    }

    fn acquire(&self) -> Result<Box<dyn rdnss_core::PacketSource>> {
        Ok(Box::new(IcmpSource::open()?))
    }
}

#[cfg(not(unix))]
impl PacketSourceFactory for IcmpFactory {
    fn name(&self) -> &'static str {
        "icmp"
    }

    fn acquire(&self) -> Result<Box<dyn rdnss_core::PacketSource>> {
        Err(Error::source_unavailable(
            "raw ICMPv6 sockets are not supported on this platform",
        ))
    }
}

/// Register the raw ICMPv6 packet source with a registry
pub fn register(registry: &mut SourceRegistry) {
    registry.register(Box::new(IcmpFactory));
}
