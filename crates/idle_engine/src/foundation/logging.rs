//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with an explicit filter such as `"info"` or `"idle_engine::scene=trace"`.
///
/// `RUST_LOG` still wins when set. Returns false if a logger was already installed,
/// which happens routinely when several tests share one process.
pub fn init_with_level(level: &str) -> bool {
    env_logger::Builder::new()
        .parse_filters(level)
        .parse_env("RUST_LOG")
        .try_init()
        .is_ok()
}
