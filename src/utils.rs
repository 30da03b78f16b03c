//! Common utilities
//!
//! Shared helpers the host application wires up once:
//! - Logging configuration
//! - Path management

pub mod logging;
pub mod paths;

// Re-export commonly used functions
pub use logging::initialize_logging;
pub use paths::{get_config_dir, get_data_dir};
