//! Tracing/logging setup shared by binaries and tests.

/// Initialize process-wide tracing from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Quiet, test-writer-backed subscriber for unit and integration tests.
pub fn init_for_tests() {
    tracing::init_for_tests();
}

/// Tracing configuration (format, filters).
pub mod tracing;

pub use tracing::{LogFormat, TracingConfig};
