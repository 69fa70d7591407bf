use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] deckhand_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to read deck file {path}: {reason}")]
    DeckFile { path: PathBuf, reason: String },
    #[error("Invalid resolution '{0}': expected ZONE:CARD=QUANTITY")]
    InvalidResolution(String),
    #[error("Revision cannot be empty")]
    EmptyRevision,
    #[error("No commit or branch matches '{0}'")]
    UnknownRevision(String),
    #[error("{0}")]
    AmbiguousRevision(String),
}
