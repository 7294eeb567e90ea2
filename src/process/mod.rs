/*!
 * Process Module
 * Child process lifecycle: start, suspend, resume, exit, wait
 */

pub mod operator;
pub mod simulation;
pub mod traits;
pub mod types;
pub mod unix;

// Re-export for convenience
pub use operator::ProcessOperator;
pub use simulation::{SimulatedCall, SimulationProcessBackend};
pub use traits::ProcessBackend;
pub use types::*;
pub use unix::UnixProcessBackend;
