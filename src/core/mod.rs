/*!
 * Core Module
 * Shared error taxonomy and primitive types
 */

pub mod errors;
pub mod types;

// Re-export for convenience
pub use errors::*;
pub use types::*;
