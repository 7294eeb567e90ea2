/*!
 * Socket Endpoint
 * One OS socket together with its IPv4 address
 */

use super::traits::SocketBackend;
use super::types::*;
use nix::sys::socket::{SockaddrIn, SockaddrLike};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};

/// A connected or listening socket
///
/// The descriptor is owned exclusively. It is closed by [`close`] or when
/// the endpoint is dropped; a closed endpoint rejects every operation with
/// [`SocketError::Closed`].
///
/// [`close`]: SocketEndpoint::close
#[derive(Debug)]
pub struct SocketEndpoint {
    descriptor: Option<OwnedFd>,
    address: SocketAddrV4,
    address_length: u32,
}

impl SocketEndpoint {
    /// Allocate a stream socket
    pub(crate) fn create<B: SocketBackend>(backend: &B) -> SocketResult<Self> {
        let fd = backend.create()?;
        Ok(Self::from_parts(
            fd,
            SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
        ))
    }

    pub(crate) fn from_parts(fd: OwnedFd, address: SocketAddrV4) -> Self {
        Self {
            descriptor: Some(fd),
            address,
            address_length: SockaddrIn::from(address).len() as u32,
        }
    }

    /// Release the descriptor
    pub(crate) fn close<B: SocketBackend>(&mut self, backend: &B) -> SocketResult<()> {
        let fd = self.descriptor.take().ok_or(SocketError::Closed)?;
        backend.close(fd)
    }

    pub(crate) fn set_address(&mut self, address: SocketAddrV4) {
        self.address = address;
        self.address_length = SockaddrIn::from(address).len() as u32;
    }

    /// Borrow the live descriptor
    pub fn fd(&self) -> SocketResult<BorrowedFd<'_>> {
        self.descriptor
            .as_ref()
            .map(AsFd::as_fd)
            .ok_or(SocketError::Closed)
    }

    /// Raw descriptor number, `None` once closed
    pub fn descriptor(&self) -> Option<RawFd> {
        self.descriptor.as_ref().map(AsRawFd::as_raw_fd)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.descriptor.is_some()
    }

    /// Bound, connected, or peer address depending on how the endpoint was made
    #[inline]
    pub fn address(&self) -> SocketAddrV4 {
        self.address
    }

    /// Size of the address structure in bytes
    #[inline]
    pub fn address_length(&self) -> u32 {
        self.address_length
    }

    /// Send bytes; a short count is returned as-is
    pub fn send<B: SocketBackend>(&self, backend: &B, buf: &[u8]) -> SocketResult<usize> {
        backend.send(self.fd()?, buf)
    }

    /// Receive up to `buf.len()` bytes; 0 means the peer closed
    pub fn recv<B: SocketBackend>(&self, backend: &B, buf: &mut [u8]) -> SocketResult<usize> {
        backend.recv(self.fd()?, buf)
    }
}
