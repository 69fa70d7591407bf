//! Error types for deckhand-core

use thiserror::Error;

use crate::models::DeckFormat;
use crate::store::StoreErrorKind;

/// Result type alias using deckhand-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in deckhand-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Operation attempted across snapshots of different formats
    #[error("Format mismatch: expected {expected}, found {found}")]
    FormatMismatch {
        expected: DeckFormat,
        found: DeckFormat,
    },

    /// Zone name not declared by the deck format
    #[error("Unknown zone '{zone}' for format {format}")]
    UnknownZone { format: DeckFormat, zone: String },

    /// A zone's capacity or uniqueness constraint would be violated
    #[error("Zone '{zone}' invariant violated: {reason}")]
    ZoneInvariantViolation { zone: String, reason: String },

    /// Applying a diff or resolution would produce an invalid snapshot
    #[error("Diff application failed: {0}")]
    DiffApplication(String),

    /// A merge was committed with conflicts left unresolved
    #[error("{count} merge conflict(s) are unresolved")]
    UnresolvedConflicts { count: usize },

    /// Version store could not be reached; the operation may be retried
    #[error("Version store unavailable ({kind}): {message}")]
    VersionStoreUnavailable {
        kind: StoreErrorKind,
        message: String,
    },

    /// Version store refused the operation; retrying will not help
    #[error("Version store rejected the request ({kind}): {message}")]
    VersionStoreRejected {
        kind: StoreErrorKind,
        message: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The background auto-saver has stopped
    #[error("Deck session has shut down")]
    SessionClosed,

    /// Card-identity lookup failure
    #[error("Card lookup failed: {0}")]
    CardLookup(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True when the caller may retry the failed operation with backoff.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::VersionStoreUnavailable { .. })
    }

    /// True for invariant/validation failures raised by the pure layers.
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::FormatMismatch { .. }
                | Self::UnknownZone { .. }
                | Self::ZoneInvariantViolation { .. }
                | Self::DiffApplication(_)
                | Self::UnresolvedConflicts { .. }
                | Self::InvalidInput(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_store_errors_are_retryable() {
        let unavailable = Error::VersionStoreUnavailable {
            kind: StoreErrorKind::Timeout,
            message: "timed out".to_string(),
        };
        let rejected = Error::VersionStoreRejected {
            kind: StoreErrorKind::Unauthorized,
            message: "bad token".to_string(),
        };
        assert!(unavailable.is_retryable());
        assert!(!rejected.is_retryable());
        assert!(!Error::UnresolvedConflicts { count: 1 }.is_retryable());
    }

    #[test]
    fn format_mismatch_message_names_both_formats() {
        let error = Error::FormatMismatch {
            expected: DeckFormat::Riftbound,
            found: DeckFormat::Commander,
        };
        let message = error.to_string();
        assert!(message.contains("riftbound"));
        assert!(message.contains("mtg-commander"));
        assert!(error.is_validation());
    }
}
