/*!
 * Socket Module
 * TCP/IPv4 client and server operators over raw descriptors
 */

pub mod client;
pub mod endpoint;
pub mod server;
pub mod traits;
pub mod types;
pub mod unix;

// Re-export for convenience
pub use client::ClientOperator;
pub use endpoint::SocketEndpoint;
pub use server::ServerOperator;
pub use traits::SocketBackend;
pub use types::*;
pub use unix::UnixSocketBackend;
