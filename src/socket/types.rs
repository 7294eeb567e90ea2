/*!
 * Socket Types
 * Error, state and option types shared by client and server operators
 */

use crate::core::{Classify, ErrorClass, OsError};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Socket operation result
pub type SocketResult<T> = Result<T, SocketError>;

/// Socket errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum SocketError {
    #[error("Socket endpoint is closed")]
    #[diagnostic(
        code(socket::closed),
        help("A closed endpoint cannot be reused. Create a new operator.")
    )]
    Closed,

    #[error("Invalid IPv4 address: {0}")]
    #[diagnostic(code(socket::invalid_address))]
    InvalidAddress(String),

    #[error("Cannot {op} while {state}")]
    #[diagnostic(
        code(socket::invalid_state),
        help("connect once per client; listen before accepting on a server.")
    )]
    InvalidState { op: SocketOp, state: EndpointState },

    /// Non-blocking accept found no pending connection
    #[error("No pending connection")]
    #[diagnostic(code(socket::would_block))]
    WouldBlock,

    #[error(transparent)]
    #[diagnostic(code(socket::os_error))]
    Os(#[from] OsError),
}

impl SocketError {
    /// Distinguish "nothing to accept yet" from a real failure. Both still
    /// classify as [`ErrorClass::GenericFailure`].
    #[inline]
    pub fn is_would_block(&self) -> bool {
        matches!(self, SocketError::WouldBlock)
    }

    /// Underlying OS error, if the failure came from a syscall
    pub fn os_error(&self) -> Option<&OsError> {
        match self {
            SocketError::Os(e) => Some(e),
            _ => None,
        }
    }
}

impl Classify for SocketError {
    fn class(&self) -> ErrorClass {
        match self {
            SocketError::Closed => ErrorClass::NullReference,
            SocketError::InvalidAddress(_)
            | SocketError::InvalidState { .. }
            | SocketError::WouldBlock
            | SocketError::Os(_) => ErrorClass::GenericFailure,
        }
    }
}

/// Lifecycle state of an operator's endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointState {
    Created,
    Connected,
    Listening,
    Closed,
}

impl fmt::Display for EndpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EndpointState::Created => "created",
            EndpointState::Connected => "connected",
            EndpointState::Listening => "listening",
            EndpointState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Operations, used for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketOp {
    Connect,
    Listen,
    Accept,
}

impl fmt::Display for SocketOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocketOp::Connect => "connect",
            SocketOp::Listen => "listen",
            SocketOp::Accept => "accept",
        };
        f.write_str(name)
    }
}

/// Blocking mode applied to the listening descriptor before an accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptMode {
    Blocking,
    NonBlocking,
}

/// Server socket options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SocketOptions {
    /// Set SO_REUSEADDR before binding
    #[serde(default)]
    pub reuse_address: bool,
}

impl SocketOptions {
    pub fn with_reuse_address(mut self, enable: bool) -> Self {
        self.reuse_address = enable;
        self
    }
}
