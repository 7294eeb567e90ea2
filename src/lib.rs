/*!
 * OS Operator Library
 * Process lifecycle and TCP socket facades over swappable OS backends
 */

pub mod core;
pub mod monitoring;
pub mod process;
pub mod socket;

// Re-exports
pub use crate::core::{classify, Classify, ErrorClass, OsError};
pub use monitoring::{init_tracing, try_init_tracing};
pub use process::{
    DropPolicy, ExecConfig, ProcessBackend, ProcessError, ProcessOperator, ProcessResult,
    ProcessStatus, SimulationProcessBackend, UnixProcessBackend, WaitOutcome,
};
pub use socket::{
    ClientOperator, ServerOperator, SocketBackend, SocketEndpoint, SocketError, SocketOptions,
    SocketResult, UnixSocketBackend,
};
