/*!
 * Client Operator
 * Outbound TCP/IPv4 connection
 */

use super::endpoint::SocketEndpoint;
use super::traits::SocketBackend;
use super::types::*;
use super::unix::UnixSocketBackend;
use crate::core::Port;
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::debug;

/// Wraps one endpoint plus the connect capability
///
/// `Created -> Connected`. A failed connect closes the endpoint; reconnecting
/// needs a new operator.
pub struct ClientOperator<B: SocketBackend> {
    backend: B,
    endpoint: SocketEndpoint,
    state: EndpointState,
}

impl ClientOperator<UnixSocketBackend> {
    /// Client bound to the POSIX backend
    pub fn native() -> SocketResult<Self> {
        Self::new(UnixSocketBackend::new())
    }
}

impl<B: SocketBackend> ClientOperator<B> {
    /// Allocate the client socket
    pub fn new(backend: B) -> SocketResult<Self> {
        let endpoint = SocketEndpoint::create(&backend)?;
        Ok(Self {
            backend,
            endpoint,
            state: EndpointState::Created,
        })
    }

    /// Connect to `ip:port`
    pub fn connect(&mut self, ip: &str, port: Port) -> SocketResult<()> {
        let fd = self.endpoint.fd()?;
        if self.state != EndpointState::Created {
            return Err(SocketError::InvalidState {
                op: SocketOp::Connect,
                state: self.state,
            });
        }

        let result = ip
            .parse::<Ipv4Addr>()
            .map_err(|_| SocketError::InvalidAddress(ip.to_string()))
            .map(|ip| SocketAddrV4::new(ip, port))
            .and_then(|addr| self.backend.connect(fd, addr).map(|()| addr));

        match result {
            Ok(addr) => {
                self.endpoint.set_address(addr);
                self.state = EndpointState::Connected;
                debug!(fd = ?self.endpoint.descriptor(), %addr, "Client connected");
                Ok(())
            }
            Err(e) => {
                // The connect error is what the caller needs to see
                let _ = self.endpoint.close(&self.backend);
                self.state = EndpointState::Closed;
                Err(e)
            }
        }
    }

    /// Send bytes to the peer; partial writes return the short count
    pub fn send(&self, buf: &[u8]) -> SocketResult<usize> {
        self.endpoint.send(&self.backend, buf)
    }

    /// Receive up to `buf.len()` bytes; 0 means the peer closed
    pub fn recv(&self, buf: &mut [u8]) -> SocketResult<usize> {
        self.endpoint.recv(&self.backend, buf)
    }

    /// Close the socket
    pub fn close(&mut self) -> SocketResult<()> {
        let result = self.endpoint.close(&self.backend);
        self.state = EndpointState::Closed;
        result
    }

    #[inline]
    pub fn state(&self) -> EndpointState {
        self.state
    }

    #[inline]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
