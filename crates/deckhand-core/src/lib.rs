//! deckhand-core - Core library for Deckhand
//!
//! Deck snapshots, the diff engine, three-way merge with conflict detection,
//! the diff applier, and the session layer that versions decks through a
//! version store.

pub mod apply;
pub mod cards;
pub mod codec;
pub mod config;
pub mod diff;
pub mod error;
pub mod merge;
pub mod models;
#[cfg(test)]
mod properties;
pub mod render;
pub mod session;
pub mod store;

pub use apply::{apply_diff, apply_resolution, resolve_merge, Resolutions};
pub use diff::{compute_diff, DeckDiff};
pub use error::{Error, Result};
pub use merge::{detect_conflicts, ConflictSet, MergeOutcome};
pub use models::{CardId, CardRef, DeckFormat, DeckSnapshot};
