//! Error types and result aliases shared across lakerun components.

/// The result type used throughout `lakerun-core`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when working with core primitives.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of what made the ID invalid.
        message: String,
    },
}
