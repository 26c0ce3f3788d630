//! Error types for archive operations.
//!
//! This module defines [`ChinaLandError`], which covers every failure the
//! session client, the Markdown exporter and the batch driver can report.
//!
//! # Example
//!
//! ```rust
//! use chinaland_core::{ChinaLandError, Result};
//!
//! fn first_year(years: &[String]) -> Result<&String> {
//!     years.first().ok_or_else(|| ChinaLandError::EmptyResult("years".to_string()))
//! }
//! # assert!(first_year(&[]).is_err());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for archive browsing and export.
///
/// Listing calls distinguish transport failures ([`ChinaLandError::NetworkError`],
/// [`ChinaLandError::Timeout`]) from well-formed but empty answers
/// ([`ChinaLandError::EmptyResult`]), so callers never mistake an outage for
/// an archive with no content.
///
/// # Example
///
/// ```rust
/// use chinaland_core::ChinaLandError;
///
/// let err = ChinaLandError::EmptyResult("issues of 2025".to_string());
/// match err {
///     ChinaLandError::EmptyResult(what) => assert_eq!(what, "issues of 2025"),
///     other => panic!("unexpected error: {other}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum ChinaLandError {
    /// The anonymous login handshake was rejected or could not complete.
    #[error("Login failed: {0}")]
    AuthError(String),

    /// HTTP transport errors from reqwest.
    ///
    /// Covers DNS failures, refused connections and non-success status codes.
    #[error("HTTP request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Request timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// The site answered, but flagged the call as unsuccessful.
    #[error("Request to {endpoint} was rejected: {message}")]
    ApiError { endpoint: String, message: String },

    /// A listing was well-formed but contained nothing.
    #[error("No results: {0}")]
    EmptyResult(String),

    /// A response did not have the expected structure.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Output could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A year, issue or article could not be found by the given key.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for ChinaLandError {
    fn from(err: config::ConfigError) -> Self {
        ChinaLandError::ConfigError(err.to_string())
    }
}

/// Result type alias for ChinaLandError.
pub type Result<T> = std::result::Result<T, ChinaLandError>;
