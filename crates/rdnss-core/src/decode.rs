//! Neighbor Discovery option decoder
//!
//! Turns the option area of a Router Advertisement into [`NdEvent`]s.
//!
//! ## Wire format
//!
//! ```text
//!  0               1               2               3
//! +---------------+---------------+-------------------------------+
//! |     Type      |  Length (x8)  |           Reserved            |
//! +---------------+---------------+-------------------------------+
//! |                       Lifetime (seconds)                      |
//! +---------------------------------------------------------------+
//! |           RDNSS: addresses / DNSSL: encoded domains           |
//! ```
//!
//! Input comes straight off the network. Every length is checked against the
//! bytes actually present before it is used.

use std::net::Ipv6Addr;

use tracing::{debug, warn};

use crate::cache::{DomainEntry, MAX_DOMAIN_LEN, ServerEntry};
use crate::clock::{Timestamp, expiry_from_lifetime};
use crate::error::{Error, Result};

/// Recursive DNS Server option type
pub const ND_OPT_RDNSS: u8 = 25;

/// DNS Search List option type
pub const ND_OPT_DNSSL: u8 = 31;

/// Size of one option length unit
const UNIT: usize = 8;

/// Size of the fixed RDNSS/DNSSL header (type, length, reserved, lifetime)
const HEADER_LEN: usize = 8;

/// One cache update decoded from an advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NdEvent {
    Server(ServerEntry),
    Domain(DomainEntry),
}

/// A single option borrowed from an option buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdOption<'a> {
    /// Option type
    pub kind: u8,
    /// The whole option, header included
    pub bytes: &'a [u8],
}

impl NdOption<'_> {
    /// Declared length in 8-byte units
    pub fn units(&self) -> usize {
        usize::from(self.bytes[1])
    }
}

/// Iterator over the options of a Router Advertisement
///
/// Yields an error and stops if an option has a zero length or runs past the
/// end of the buffer, since the length is the only way to find the next one.
#[derive(Debug, Clone)]
pub struct NdOptions<'a> {
    rest: &'a [u8],
}

/// Iterate over the options in `buf`
pub fn options(buf: &[u8]) -> NdOptions<'_> {
    NdOptions { rest: buf }
}

impl<'a> Iterator for NdOptions<'a> {
    type Item = Result<NdOption<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.len() < 2 {
            return None;
        }

        let len = usize::from(self.rest[1]) * UNIT;
        if len == 0 || len > self.rest.len() {
            let err = Error::malformed(format!(
                "option type {} declares {} bytes, {} remaining",
                self.rest[0],
                len,
                self.rest.len()
            ));
            self.rest = &[];
            return Some(Err(err));
        }

        let (bytes, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some(Ok(NdOption {
            kind: bytes[0],
            bytes,
        }))
    }
}

/// Decode every RDNSS and DNSSL option in `buf`
///
/// A malformed RDNSS or DNSSL option is logged and skipped. A broken option
/// header aborts the walk with an error; events decoded before it are kept in
/// `events`.
///
/// # Parameters
///
/// - `buf`: Option area of the advertisement
/// - `ifindex`: Interface the advertisement arrived on
/// - `now`: Reception time, used to turn lifetimes into expiries
/// - `events`: Output for decoded events
pub fn decode_options(
    buf: &[u8],
    ifindex: u32,
    now: Timestamp,
    events: &mut Vec<NdEvent>,
) -> Result<()> {
    for option in options(buf) {
        let option = option?;
        let decoded = match option.kind {
            ND_OPT_RDNSS => decode_rdnss(option.bytes, ifindex, now, events),
            ND_OPT_DNSSL => decode_dnssl(option.bytes, now, events),
            other => {
                debug!("Skipping ND option type {}", other);
                continue;
            }
        };

        if let Err(e) = decoded {
            warn!("Ignoring option on interface {}: {}", ifindex, e);
        }
    }

    Ok(())
}

/// Decode one RDNSS option (header included)
///
/// Emits one [`NdEvent::Server`] per address. Nothing is emitted when the
/// option is rejected.
pub fn decode_rdnss(
    opt: &[u8],
    ifindex: u32,
    now: Timestamp,
    events: &mut Vec<NdEvent>,
) -> Result<()> {
    let units = declared_units(opt)?;
    if units < 3 || units % 2 == 0 {
        return Err(Error::malformed(format!(
            "RDNSS length {} must be odd and at least 3",
            units
        )));
    }

    let expiry = expiry_from_lifetime(now, lifetime(opt));
    for chunk in opt[HEADER_LEN..units * UNIT].chunks_exact(16) {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(chunk);
        events.push(NdEvent::Server(ServerEntry::new(
            Ipv6Addr::from(octets),
            ifindex,
            expiry,
        )));
    }

    Ok(())
}

/// Decode one DNSSL option (header included)
///
/// Emits one [`NdEvent::Domain`] per encoded name. On a malformed label the
/// rest of the option is dropped; names decoded before it stay in `events`.
pub fn decode_dnssl(opt: &[u8], now: Timestamp, events: &mut Vec<NdEvent>) -> Result<()> {
    let units = declared_units(opt)?;
    if units < 2 {
        return Err(Error::malformed(format!(
            "DNSSL length {} must be at least 2",
            units
        )));
    }

    let expiry = expiry_from_lifetime(now, lifetime(opt));
    let mut rest = &opt[HEADER_LEN..units * UNIT];

    while let Some((&first, _)) = rest.split_first() {
        if first == 0 {
            // padding, or the terminator after the last name
            rest = &rest[1..];
            continue;
        }

        let (name, consumed) = read_domain(rest)?;
        rest = &rest[consumed..];
        events.push(NdEvent::Domain(DomainEntry::new(name, expiry)));
    }

    Ok(())
}

/// Read one label sequence up to and including its zero terminator
///
/// Returns the dot-joined name and the number of bytes consumed.
fn read_domain(buf: &[u8]) -> Result<(String, usize)> {
    let mut name = String::new();
    let mut pos = 0;

    loop {
        let Some(&len) = buf.get(pos) else {
            return Err(Error::malformed("domain name is not terminated"));
        };
        pos += 1;
        if len == 0 {
            return Ok((name, pos));
        }

        let len = usize::from(len);
        let remaining = buf.len() - pos;
        if len > remaining {
            return Err(Error::malformed(format!(
                "label of {} bytes exceeds the {} bytes left",
                len, remaining
            )));
        }
        let separator = usize::from(!name.is_empty());
        if name.len() + separator + len > MAX_DOMAIN_LEN - 1 {
            return Err(Error::malformed(format!(
                "domain exceeds {} bytes",
                MAX_DOMAIN_LEN - 1
            )));
        }

        let label = &buf[pos..pos + len];
        if !label.iter().all(|&b| b.is_ascii_graphic() && b != b'.') {
            return Err(Error::malformed("label contains unsupported characters"));
        }

        if !name.is_empty() {
            name.push('.');
        }
        // checked above: printable ASCII only
        name.extend(label.iter().map(|&b| char::from(b)));
        pos += len;
    }
}

fn declared_units(opt: &[u8]) -> Result<usize> {
    if opt.len() < HEADER_LEN {
        return Err(Error::malformed(format!("option of {} bytes is truncated", opt.len())));
    }

    let units = usize::from(opt[1]);
    if units * UNIT > opt.len() {
        return Err(Error::malformed(format!(
            "option declares {} units but only {} bytes are present",
            units,
            opt.len()
        )));
    }
    Ok(units)
}

fn lifetime(opt: &[u8]) -> u32 {
    u32::from_be_bytes([opt[4], opt[5], opt[6], opt[7]])
}
