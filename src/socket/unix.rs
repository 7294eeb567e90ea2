/*!
 * Unix Socket Backend
 * BSD sockets and fcntl through nix
 */

use super::traits::SocketBackend;
use super::types::*;
use crate::core::{Backlog, OsContext, OsError};
use crate::monitoring::OsCallSpan;
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::socket::{
    self, sockopt, AddressFamily, Backlog as ListenBacklog, MsgFlags, SockFlag, SockType,
    SockaddrIn,
};
use std::net::SocketAddrV4;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd};
use tracing::{debug, warn};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: MsgFlags = MsgFlags::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: MsgFlags = MsgFlags::empty();

#[cfg(any(target_os = "linux", target_os = "android"))]
const SOCKET_FLAGS: SockFlag = SockFlag::SOCK_CLOEXEC;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SOCKET_FLAGS: SockFlag = SockFlag::empty();

/// POSIX socket calls
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixSocketBackend;

impl UnixSocketBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Backlog handed to listen(2)
///
/// The kernel treats the value as unsigned and caps it at somaxconn, so
/// negative and oversized requests both end up as the maximum.
fn listen_backlog(backlog: Backlog) -> ListenBacklog {
    ListenBacklog::new(backlog).unwrap_or(ListenBacklog::MAXCONN)
}

/// Run one call inside an [`OsCallSpan`]
fn traced<T>(
    call: &'static str,
    fd: i32,
    f: impl FnOnce() -> nix::Result<T>,
) -> Result<T, OsError> {
    let span = OsCallSpan::new(call, fd);
    let outcome = f().os_context(call);
    span.record_outcome(&outcome);
    outcome
}

impl SocketBackend for UnixSocketBackend {
    fn create(&self) -> SocketResult<OwnedFd> {
        let fd = traced("socket", -1, || {
            socket::socket(
                AddressFamily::Inet,
                SockType::Stream,
                SOCKET_FLAGS,
                None,
            )
        })?;
        debug!(fd = fd.as_raw_fd(), "Created stream socket");
        Ok(fd)
    }

    fn connect(&self, fd: BorrowedFd<'_>, addr: SocketAddrV4) -> SocketResult<()> {
        let raw = fd.as_raw_fd();
        let sockaddr = SockaddrIn::from(addr);
        traced("connect", raw, || socket::connect(raw, &sockaddr)).map_err(|e| {
            warn!(fd = raw, %addr, error = %e, "Connection failed");
            e
        })?;
        Ok(())
    }

    fn bind(&self, fd: BorrowedFd<'_>, addr: SocketAddrV4) -> SocketResult<()> {
        let raw = fd.as_raw_fd();
        let sockaddr = SockaddrIn::from(addr);
        Ok(traced("bind", raw, || socket::bind(raw, &sockaddr))?)
    }

    fn listen(&self, fd: BorrowedFd<'_>, backlog: Backlog) -> SocketResult<()> {
        let raw = fd.as_raw_fd();
        Ok(traced("listen", raw, || {
            socket::listen(&fd, listen_backlog(backlog))
        })?)
    }

    fn set_reuse_address(&self, fd: BorrowedFd<'_>, enable: bool) -> SocketResult<()> {
        let raw = fd.as_raw_fd();
        Ok(traced("setsockopt", raw, || {
            socket::setsockopt(&fd, sockopt::ReuseAddr, &enable)
        })?)
    }

    fn set_nonblocking(&self, fd: BorrowedFd<'_>, enable: bool) -> SocketResult<()> {
        let raw = fd.as_raw_fd();
        let bits = traced("fcntl", raw, || fcntl(raw, FcntlArg::F_GETFL))?;

        let mut flags = OFlag::from_bits_truncate(bits);
        flags.set(OFlag::O_NONBLOCK, enable);

        traced("fcntl", raw, || fcntl(raw, FcntlArg::F_SETFL(flags)))?;
        Ok(())
    }

    fn accept(&self, fd: BorrowedFd<'_>) -> SocketResult<(OwnedFd, SocketAddrV4)> {
        let raw = fd.as_raw_fd();
        let span = OsCallSpan::blocking("accept", raw);
        let outcome = loop {
            match socket::accept(raw) {
                Err(Errno::EINTR) => continue,
                other => break other.os_context("accept"),
            }
        };
        span.record_outcome(&outcome);

        let conn = match outcome {
            Ok(conn) => conn,
            Err(e) if e.is_would_block() => return Err(SocketError::WouldBlock),
            Err(e) => return Err(e.into()),
        };
        // SAFETY: accept(2) just returned this descriptor and nothing else owns it
        let conn = unsafe { OwnedFd::from_raw_fd(conn) };

        let peer = traced("getpeername", conn.as_raw_fd(), || {
            socket::getpeername::<SockaddrIn>(conn.as_raw_fd())
        })?;
        Ok((conn, SocketAddrV4::from(peer)))
    }

    fn local_address(&self, fd: BorrowedFd<'_>) -> SocketResult<SocketAddrV4> {
        let raw = fd.as_raw_fd();
        let addr = traced("getsockname", raw, || socket::getsockname::<SockaddrIn>(raw))?;
        Ok(SocketAddrV4::from(addr))
    }

    fn send(&self, fd: BorrowedFd<'_>, buf: &[u8]) -> SocketResult<usize> {
        let raw = fd.as_raw_fd();
        Ok(traced("send", raw, || socket::send(raw, buf, SEND_FLAGS))?)
    }

    fn recv(&self, fd: BorrowedFd<'_>, buf: &mut [u8]) -> SocketResult<usize> {
        let raw = fd.as_raw_fd();
        let span = OsCallSpan::blocking("recv", raw);
        let outcome = socket::recv(raw, buf, MsgFlags::empty()).os_context("recv");
        span.record_outcome(&outcome);
        Ok(outcome?)
    }

    fn close(&self, fd: OwnedFd) -> SocketResult<()> {
        let raw = fd.into_raw_fd();
        Ok(traced("close", raw, || nix::unistd::close(raw))?)
    }

    fn platform(&self) -> &'static str {
        "unix"
    }
}
