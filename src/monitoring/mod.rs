/*!
 * Monitoring
 * Structured tracing around syscall-level operations
 */

mod tracer;

pub use tracer::{generate_trace_id, init_tracing, try_init_tracing, OsCallSpan};
