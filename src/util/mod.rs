//! Utility modules for toolforge

pub mod atomic;
pub mod logging;

pub use atomic::write_atomic;
pub use logging::{init_default, init_from_env, init_logging, LoggingConfig};
