/*!
 * Syscall Tracing
 * Structured spans for the OS calls issued by the operators
 *
 * The library never installs a subscriber on its own. Callers that want
 * output call [`init_tracing`] (or [`try_init_tracing`] from tests).
 */

use crate::core::OsError;
use std::time::{Duration, Instant};
use tracing::{debug, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Calls slower than this are reported, unless they are allowed to block
const SLOW_CALL_THRESHOLD: Duration = Duration::from_millis(10);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - OS_OPERATOR_TRACE_JSON: Enable JSON output (default: false)
///
/// # Panics
/// Panics if a global subscriber is already installed.
pub fn init_tracing() {
    if let Err(e) = try_init_tracing() {
        panic!("failed to install tracing subscriber: {}", e);
    }
}

/// Initialize structured tracing, returning an error if a subscriber is
/// already installed
pub fn try_init_tracing() -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("OS_OPERATOR_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    }
}

/// Generate a unique trace ID for call correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one OS call
///
/// # Example
///
/// ```rust
/// use os_operator::monitoring::OsCallSpan;
///
/// let span = OsCallSpan::new("kill", 4242);
/// span.record_result(true);
/// // duration is recorded when the span drops
/// ```
pub struct OsCallSpan {
    span: tracing::Span,
    start: Instant,
    call: &'static str,
    trace_id: String,
    may_block: bool,
}

impl OsCallSpan {
    /// Open a span for `call` acting on `target` (a pid or descriptor)
    pub fn new(call: &'static str, target: i32) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::DEBUG,
            "os_call",
            trace_id = %trace_id,
            call = call,
            target = target,
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
            errno = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            call,
            trace_id,
            may_block: false,
        }
    }

    /// Open a span for a call that is allowed to block indefinitely
    /// (waits, blocking accepts); these are never flagged as slow
    pub fn blocking(call: &'static str, target: i32) -> Self {
        let mut span = Self::new(call, target);
        span.may_block = true;
        span
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Record the call result
    pub fn record_result(&self, success: bool) {
        self.span
            .record("result", if success { "success" } else { "error" });
    }

    /// Record a failed call, keeping its errno
    pub fn record_os_error(&self, error: &OsError) {
        self.span.record("errno", error.code());
        self.span.record("error", tracing::field::display(error));
        self.span.record("result", "error");
    }

    /// Record the outcome of a call returning `Result<_, OsError>`
    pub fn record_outcome<T>(&self, outcome: &Result<T, OsError>) {
        match outcome {
            Ok(_) => self.record_result(true),
            Err(e) => self.record_os_error(e),
        }
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for OsCallSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        if !self.may_block && duration > SLOW_CALL_THRESHOLD {
            warn!(
                trace_id = %self.trace_id,
                call = self.call,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow os call detected"
            );
        } else {
            debug!(
                trace_id = %self.trace_id,
                call = self.call,
                duration_us = duration.as_micros() as u64,
                "os call completed"
            );
        }
    }
}
