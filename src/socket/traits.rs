/*!
 * Socket Traits
 * Backend capability table for TCP/IPv4 sockets
 */

use super::types::*;
use crate::core::Backlog;
use std::net::SocketAddrV4;
use std::os::fd::{BorrowedFd, OwnedFd};

/// OS mechanism behind the client and server operators
///
/// Backends are stateless: every call acts on a descriptor owned by a
/// [`SocketEndpoint`](super::SocketEndpoint).
pub trait SocketBackend: Send + Sync {
    /// Allocate a stream socket
    fn create(&self) -> SocketResult<OwnedFd>;

    fn connect(&self, fd: BorrowedFd<'_>, addr: SocketAddrV4) -> SocketResult<()>;

    fn bind(&self, fd: BorrowedFd<'_>, addr: SocketAddrV4) -> SocketResult<()>;

    /// Mark the descriptor passive
    fn listen(&self, fd: BorrowedFd<'_>, backlog: Backlog) -> SocketResult<()>;

    fn set_reuse_address(&self, fd: BorrowedFd<'_>, enable: bool) -> SocketResult<()>;

    /// Set or clear O_NONBLOCK, preserving every other file status flag
    fn set_nonblocking(&self, fd: BorrowedFd<'_>, enable: bool) -> SocketResult<()>;

    /// Accept one pending connection, returning it with its peer address
    ///
    /// A non-blocking descriptor with nothing pending yields
    /// [`SocketError::WouldBlock`].
    fn accept(&self, fd: BorrowedFd<'_>) -> SocketResult<(OwnedFd, SocketAddrV4)>;

    /// Address the descriptor is bound to
    fn local_address(&self, fd: BorrowedFd<'_>) -> SocketResult<SocketAddrV4>;

    fn send(&self, fd: BorrowedFd<'_>, buf: &[u8]) -> SocketResult<usize>;

    fn recv(&self, fd: BorrowedFd<'_>, buf: &mut [u8]) -> SocketResult<usize>;

    /// Release the descriptor, reporting close(2) failures
    fn close(&self, fd: OwnedFd) -> SocketResult<()>;

    /// Name of the mechanism, for diagnostics
    fn platform(&self) -> &'static str;
}
