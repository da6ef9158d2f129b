//! Error types for ccdgrade-core.

use thiserror::Error;

/// Result type alias for ccdgrade operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for ccdgrade operations.
///
/// Rejected events are not errors; they are reported through
/// [`crate::Outcome`]. These variants only cover bad configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// Grade number outside 0..=7.
    #[error("invalid grade: {0} (grades are 0 through 7)")]
    InvalidGrade(u8),

    /// Unknown reset-clock correction style.
    #[error("invalid reset style: {0:?} (expected none, 1, 3 or 6)")]
    InvalidResetStyle(String),

    /// Unknown partial-sum policy.
    #[error("invalid p9 policy: {0:?} (expected p9, p17, p35, p1357 or plist)")]
    InvalidP9Policy(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
