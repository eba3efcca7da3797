// # OS Glue
//
// Thin wrappers over the few libc calls the daemon needs:
// - descriptor flags for packet source sockets
// - interface index to name resolution for link-local servers
// - dropping root privileges after the packet source is open

#[cfg(unix)]
use std::ffi::{CStr, CString};
#[cfg(unix)]
use std::io;
#[cfg(unix)]
use std::os::fd::RawFd;

#[cfg(unix)]
use tracing::info;
use tracing::warn;

#[cfg(unix)]
use crate::error::Error;
use crate::error::Result;

/// Make `fd` non-blocking and close-on-exec
#[cfg(unix)]
pub fn prepare_fd(fd: RawFd) -> io::Result<()> {
    // SAFETY: fcntl on a caller-owned descriptor with integer arguments only
    unsafe {
        let fd_flags = libc::fcntl(fd, libc::F_GETFD);
        if fd_flags == -1 || libc::fcntl(fd, libc::F_SETFD, fd_flags | libc::FD_CLOEXEC) == -1 {
            return Err(io::Error::last_os_error());
        }

        let fl_flags = libc::fcntl(fd, libc::F_GETFL);
        if fl_flags == -1 || libc::fcntl(fd, libc::F_SETFL, fl_flags | libc::O_NONBLOCK) == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Name of the interface with index `ifindex`, if it still exists
#[cfg(unix)]
pub fn interface_name(ifindex: u32) -> Option<String> {
    let mut buf = [0 as libc::c_char; libc::IF_NAMESIZE];
    // SAFETY: buf holds IF_NAMESIZE bytes as required by if_indextoname
    let ptr = unsafe { libc::if_indextoname(ifindex, buf.as_mut_ptr()) };
    if ptr.is_null() {
        return None;
    }
    // SAFETY: on success the buffer holds a NUL-terminated name
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Some(name.to_string_lossy().into_owned())
}

#[cfg(not(unix))]
pub fn interface_name(_ifindex: u32) -> Option<String> {
    None
}

/// Switch to the given account's user and groups
///
/// Does nothing when `username` is `None`. When the process is not running as
/// root there is nothing to drop, so the request is skipped with a warning.
#[cfg(unix)]
pub fn drop_privileges(username: Option<&str>) -> Result<()> {
    let Some(username) = username else {
        return Ok(());
    };

    // SAFETY: geteuid has no preconditions
    if unsafe { libc::geteuid() } != 0 {
        warn!("Not running as root, keeping current user instead of {}", username);
        return Ok(());
    }

    let c_name = CString::new(username)
        .map_err(|_| Error::privileges(format!("invalid user name {:?}", username)))?;

    // SAFETY: c_name is NUL-terminated; the returned record is copied out
    // before any other passwd call can overwrite it
    let (uid, gid) = unsafe {
        let pw = libc::getpwnam(c_name.as_ptr());
        if pw.is_null() {
            return Err(Error::privileges(format!("cannot find user \"{}\"", username)));
        }
        ((*pw).pw_uid, (*pw).pw_gid)
    };

    // SAFETY: plain syscalls on values obtained above
    unsafe {
        if libc::setgid(gid) != 0 {
            return Err(os_error("setgid"));
        }
        if libc::initgroups(c_name.as_ptr(), gid as _) != 0 {
            return Err(os_error("initgroups"));
        }
        if libc::setuid(uid) != 0 {
            return Err(os_error("setuid"));
        }
    }

    info!("Dropped privileges to {} (uid {}, gid {})", username, uid, gid);
    Ok(())
}

#[cfg(not(unix))]
pub fn drop_privileges(username: Option<&str>) -> Result<()> {
    if let Some(username) = username {
        warn!("Privilege drop to {} is not supported on this platform", username);
    }
    Ok(())
}

#[cfg(unix)]
fn os_error(call: &str) -> Error {
    Error::privileges(format!("{}: {}", call, io::Error::last_os_error()))
}
