/*!
 * Core Types
 * Common types used by the process and socket operators
 */

/// Platform process identifier (`pid_t`)
pub type RawPid = i32;

/// Socket port number
pub type Port = u16;

/// Maximum number of pending, not-yet-accepted connections
pub type Backlog = i32;
