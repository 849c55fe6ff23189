//! Error types for telemon

use std::io;
use thiserror::Error;

/// Result type alias for telemon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by hardware sources, counter sources and configuration.
///
/// A sensor or counter instance that simply does not exist on this machine is
/// not an error; selection code returns `None` for it instead.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// The hardware enumeration source failed
    #[error("Hardware unavailable: {0}")]
    HardwareUnavailable(String),

    /// A performance-counter category is missing entirely
    #[error("Counter category missing: {0}")]
    CounterCategoryMissing(String),

    /// A counter instance could not be opened
    #[error("Counter instance missing: {category}/{instance}")]
    CounterInstanceMissing { category: String, instance: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unsupported platform
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}
