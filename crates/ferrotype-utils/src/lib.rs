//! # Ferrotype Utilities
//!
//! Shared utilities for the Ferrotype workspace, chiefly logging set up on
//! top of `tracing`.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_with_level, LogFormat, LogLevel, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
