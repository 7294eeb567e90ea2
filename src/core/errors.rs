/*!
 * Error Types
 * Three-way outcome classification shared by every operator
 */

use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally observed outcome of an operation
///
/// Operator errors carry far more detail than this, but every one of them
/// collapses onto exactly one of these classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Ok,
    /// Any syscall failure or precondition violation
    GenericFailure,
    /// The operation received an unusable handle
    NullReference,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::Ok => "ok",
            ErrorClass::GenericFailure => "generic_failure",
            ErrorClass::NullReference => "null_reference",
        };
        f.write_str(name)
    }
}

/// Errors that can be mapped onto an [`ErrorClass`]
pub trait Classify {
    fn class(&self) -> ErrorClass;
}

/// Classify an operation result
#[inline]
pub fn classify<T, E: Classify>(result: &Result<T, E>) -> ErrorClass {
    match result {
        Ok(_) => ErrorClass::Ok,
        Err(e) => e.class(),
    }
}

/// A failed syscall together with its errno
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsError {
    op: &'static str,
    errno: Errno,
}

impl OsError {
    pub fn new(op: &'static str, errno: Errno) -> Self {
        Self { op, errno }
    }

    /// Build from an `io::Error`, falling back to `EIO` when it has no OS code
    pub fn from_io(op: &'static str, err: &std::io::Error) -> Self {
        let errno = err.raw_os_error().map(Errno::from_raw).unwrap_or(Errno::EIO);
        Self { op, errno }
    }

    /// Name of the failed call
    #[inline]
    pub fn op(&self) -> &'static str {
        self.op
    }

    #[inline]
    pub fn errno(&self) -> Errno {
        self.errno
    }

    /// Raw errno value
    #[inline]
    pub fn code(&self) -> i32 {
        self.errno as i32
    }

    /// `EAGAIN`/`EWOULDBLOCK`
    #[inline]
    pub fn is_would_block(&self) -> bool {
        matches!(self.errno, Errno::EAGAIN) || self.errno == Errno::EWOULDBLOCK
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {} (errno {})", self.op, self.errno.desc(), self.code())
    }
}

impl std::error::Error for OsError {}

impl Classify for OsError {
    fn class(&self) -> ErrorClass {
        ErrorClass::GenericFailure
    }
}

/// Map a nix result onto an [`OsError`] tagged with the call name
pub trait OsContext<T> {
    fn os_context(self, op: &'static str) -> Result<T, OsError>;
}

impl<T> OsContext<T> for nix::Result<T> {
    #[inline]
    fn os_context(self, op: &'static str) -> Result<T, OsError> {
        self.map_err(|errno| OsError::new(op, errno))
    }
}
