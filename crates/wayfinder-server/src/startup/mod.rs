//! Application startup utilities module.

mod http;
mod logging;
mod shutdown;

pub use http::registry_server;
pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use shutdown::{ShutdownSignal, join_background, run_with_shutdown, wait_for_shutdown_signal};
