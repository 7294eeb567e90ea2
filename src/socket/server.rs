/*!
 * Server Operator
 * Listening TCP/IPv4 socket with blocking and non-blocking accept
 */

use super::endpoint::SocketEndpoint;
use super::traits::SocketBackend;
use super::types::*;
use super::unix::UnixSocketBackend;
use crate::core::{Backlog, Port};
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::debug;

/// Wraps the listening endpoint plus listen and accept capabilities
///
/// `Created -> Listening`, then any number of accepts. Each accept first
/// rewrites O_NONBLOCK on the listening descriptor for that one call. Accept
/// takes `&mut self`, so the flag update and the accept it guards cannot
/// interleave with another caller's.
pub struct ServerOperator<B: SocketBackend> {
    backend: B,
    endpoint: SocketEndpoint,
    state: EndpointState,
    options: SocketOptions,
    accept_mode: Option<AcceptMode>,
}

impl ServerOperator<UnixSocketBackend> {
    /// Server bound to the POSIX backend
    pub fn native() -> SocketResult<Self> {
        Self::new(UnixSocketBackend::new())
    }
}

impl<B: SocketBackend> ServerOperator<B> {
    /// Allocate the listening socket with default options
    pub fn new(backend: B) -> SocketResult<Self> {
        Self::with_options(backend, SocketOptions::default())
    }

    pub fn with_options(backend: B, options: SocketOptions) -> SocketResult<Self> {
        let endpoint = SocketEndpoint::create(&backend)?;
        Ok(Self {
            backend,
            endpoint,
            state: EndpointState::Created,
            options,
            accept_mode: None,
        })
    }

    /// Bind to `0.0.0.0:port` and start listening
    ///
    /// Port 0 picks an ephemeral port; read it back with [`local_port`].
    /// On failure the socket stays open and must still be closed.
    ///
    /// [`local_port`]: ServerOperator::local_port
    pub fn listen(&mut self, port: Port, backlog: Backlog) -> SocketResult<()> {
        let fd = self.endpoint.fd()?;
        if self.state != EndpointState::Created {
            return Err(SocketError::InvalidState {
                op: SocketOp::Listen,
                state: self.state,
            });
        }

        if self.options.reuse_address {
            self.backend.set_reuse_address(fd, true)?;
        }

        let requested = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        self.backend.bind(fd, requested)?;
        self.backend.listen(fd, backlog)?;

        let bound = self.backend.local_address(fd).unwrap_or(requested);
        self.endpoint.set_address(bound);
        self.state = EndpointState::Listening;
        debug!(fd = ?self.endpoint.descriptor(), %bound, backlog, "Server listening");
        Ok(())
    }

    /// Wait for and accept one connection
    pub fn accept_blocking(&mut self) -> SocketResult<SocketEndpoint> {
        self.accept(AcceptMode::Blocking)
    }

    /// Accept one connection if one is pending
    ///
    /// Returns [`SocketError::WouldBlock`] immediately when nothing is
    /// queued.
    pub fn accept_non_blocking(&mut self) -> SocketResult<SocketEndpoint> {
        self.accept(AcceptMode::NonBlocking)
    }

    fn accept(&mut self, mode: AcceptMode) -> SocketResult<SocketEndpoint> {
        let fd = self.endpoint.fd()?;
        if self.state != EndpointState::Listening {
            return Err(SocketError::InvalidState {
                op: SocketOp::Accept,
                state: self.state,
            });
        }

        self.backend
            .set_nonblocking(fd, mode == AcceptMode::NonBlocking)?;
        self.accept_mode = Some(mode);

        let (conn, peer) = self.backend.accept(fd)?;
        let endpoint = SocketEndpoint::from_parts(conn, peer);
        debug!(fd = ?endpoint.descriptor(), %peer, ?mode, "Accepted connection");
        Ok(endpoint)
    }

    /// Send on an accepted connection
    pub fn send(&self, conn: &SocketEndpoint, buf: &[u8]) -> SocketResult<usize> {
        conn.send(&self.backend, buf)
    }

    /// Receive on an accepted connection; 0 means the peer closed
    pub fn recv(&self, conn: &SocketEndpoint, buf: &mut [u8]) -> SocketResult<usize> {
        conn.recv(&self.backend, buf)
    }

    /// Close an accepted connection
    pub fn close_connection(&self, conn: &mut SocketEndpoint) -> SocketResult<()> {
        conn.close(&self.backend)
    }

    /// Close the listening socket
    pub fn close(&mut self) -> SocketResult<()> {
        let result = self.endpoint.close(&self.backend);
        self.state = EndpointState::Closed;
        result
    }

    /// Port the listening socket is bound to
    pub fn local_port(&self) -> SocketResult<Port> {
        let fd = self.endpoint.fd()?;
        Ok(self.backend.local_address(fd)?.port())
    }

    #[inline]
    pub fn state(&self) -> EndpointState {
        self.state
    }

    /// Mode applied by the most recent accept
    #[inline]
    pub fn accept_mode(&self) -> Option<AcceptMode> {
        self.accept_mode
    }

    #[inline]
    pub fn options(&self) -> SocketOptions {
        self.options
    }

    #[inline]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
