//! Utility modules for sst

pub mod logging;

pub use logging::{init_logging, LoggingConfig};
