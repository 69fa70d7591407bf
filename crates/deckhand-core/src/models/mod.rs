//! Data models for Deckhand

mod card;
mod commit;
mod format;
mod snapshot;

pub use card::{CardId, CardRef, RawCardRecord};
pub use commit::{BranchInfo, CommitId, CommitInfo, RepoRef};
pub use format::{DeckFormat, ZoneSpec};
pub use snapshot::{
    CopyLimitViolation, DeckBuilder, DeckSnapshot, Zone, CURRENT_SCHEMA_VERSION,
};
