//! Ambient plumbing shared by every metron module: errors, configuration,
//! time sources and logging setup.

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{Config, ConfigBuilder, LogLevel};
pub use error::{MetricsError, Result};
