//! Error types for the run coordination domain.
//!
//! The taxonomy keeps expected coordination outcomes (a held lock) apart
//! from infrastructure failures (an unreachable store), so callers never
//! conflate "cannot acquire because held" with "cannot acquire because the
//! store is down".

use lakerun_core::RunId;

use crate::run::RunState;

/// The result type used throughout lakerun-flow.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in run coordination operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The run lock is already held by another run.
    ///
    /// Expected contention, not an infrastructure failure. Retry and backoff
    /// policy belongs to the caller; this core never retries acquisition.
    #[error("pipeline lock is already held by {holder}")]
    LockHeld {
        /// Identity of the current holder, or "unknown" if unreadable.
        holder: String,
    },

    /// A backing-store operation failed transiently.
    ///
    /// Callers treat this as retryable, not as a lifecycle event.
    #[error("store unavailable: {message}")]
    StoreUnavailable {
        /// Description of the store failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The external system refused to start the job.
    ///
    /// Terminal for that attempt; the caller's lock is released on the same
    /// failure path before this error surfaces.
    #[error("pipeline trigger rejected: {message}")]
    TriggerRejected {
        /// Description of the rejection.
        message: String,
    },

    /// A status check against the external job failed.
    ///
    /// Transient: the run stays in its last known state and the next poll
    /// attempt is expected later.
    #[error("status poll unavailable: {message}")]
    PollUnavailable {
        /// Description of the poll failure.
        message: String,
    },

    /// A run with this identifier already exists.
    ///
    /// Identifiers are caller-generated, so this is a real possibility and
    /// is not retryable.
    #[error("duplicate run identifier: {run_id}")]
    DuplicateRun {
        /// The colliding run identifier.
        run_id: RunId,
    },

    /// A run was not found.
    #[error("run not found: {run_id}")]
    RunNotFound {
        /// The run ID that was looked up.
        run_id: RunId,
    },

    /// An update would move a run backward along the lifecycle.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// The run's current state.
        from: RunState,
        /// The rejected target state.
        to: RunState,
    },

    /// A run cannot be polled because no tracking handle was recorded.
    #[error("run {run_id} has no tracking handle to poll")]
    MissingTrackingHandle {
        /// The run missing its handle.
        run_id: RunId,
    },

    /// A precondition for the operation was violated.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the violated precondition.
        message: String,
    },

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An error from lakerun-core.
    #[error("core error: {0}")]
    Core(#[from] lakerun_core::Error),
}

impl Error {
    /// Creates a new store-unavailable error.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new store-unavailable error with a source cause.
    #[must_use]
    pub fn store_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns true if the error is transient and worth retrying later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::PollUnavailable { .. }
        )
    }
}
