//! Tracing and logging setup shared by the catalog binaries.

/// Initialize process-wide tracing/logging.
///
/// Output format comes from `CATALOG_LOG_FORMAT` (`json` by default, or `pretty`).
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use crate::tracing::{LogFormat, UnknownLogFormat, init_with};
