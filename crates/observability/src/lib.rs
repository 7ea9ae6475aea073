//! Tracing and logging setup shared by the ledgerd binaries and tests.

/// Initialize process-wide tracing/logging.
///
/// `verbose` lowers the default level to `debug` (development); `RUST_LOG`
/// always wins when set. Safe to call multiple times; subsequent calls
/// become no-ops.
pub fn init(verbose: bool) {
    tracing::init(verbose);
}

/// Tracing configuration (filters, layers).
pub mod tracing;
