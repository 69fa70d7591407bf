//! Version-store collaborator
//!
//! The version store stands in for the Git server that owns commits, branches
//! and the serialized deck files. The orchestrator is the only caller; it
//! classifies [`StoreError`]s into retryable and terminal core errors.

mod memory;
mod migrations;
mod sqlite;

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::future::Future;

use thiserror::Error;

use crate::models::{BranchInfo, CommitId, CommitInfo, DeckSnapshot, RepoRef};

pub use memory::MemoryVersionStore;
pub use sqlite::SqliteVersionStore;

/// Failure category reported by a version store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Connection refused, DNS failure, reset
    Network,
    Timeout,
    Unauthorized,
    Forbidden,
    /// Commit, branch, repository or path does not exist
    NotFound,
    /// Parent commit is stale or the name is taken
    Conflict,
    /// Request rejected as malformed
    Invalid,
    /// Storage backend failure
    Backend,
}

impl StoreErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::Invalid => "invalid",
            Self::Backend => "backend",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw failure from a version store
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Conflict, message)
    }

    /// Whether the same request might succeed later
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            StoreErrorKind::Network | StoreErrorKind::Timeout => true,
            StoreErrorKind::Backend => {
                let message = self.message.to_ascii_lowercase();
                message.contains("database is locked")
                    || message.contains("database busy")
                    || message.contains("temporarily unavailable")
            }
            _ => false,
        }
    }
}

impl From<StoreError> for crate::Error {
    fn from(error: StoreError) -> Self {
        if error.is_retryable() {
            Self::VersionStoreUnavailable {
                kind: error.kind,
                message: error.message,
            }
        } else {
            Self::VersionStoreRejected {
                kind: error.kind,
                message: error.message,
            }
        }
    }
}

/// A commit to be recorded by [`VersionStore::create_commit`]
#[derive(Debug, Clone, Copy)]
pub struct NewCommit<'a> {
    pub branch: &'a str,
    /// Deck file path inside the repository
    pub path: &'a str,
    pub snapshot: &'a DeckSnapshot,
    pub message: &'a str,
    pub author: &'a str,
    pub parents: &'a [CommitId],
}

/// Result type alias for version-store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage for deck history.
///
/// Implementations must serialize snapshots losslessly. All futures are
/// `Send` so stores can be driven from spawned tasks.
pub trait VersionStore: Send + Sync {
    /// Deck file at `path` as of `commit`
    fn get_snapshot(
        &self,
        repo: &RepoRef,
        commit: &CommitId,
        path: &str,
    ) -> impl Future<Output = StoreResult<DeckSnapshot>> + Send;

    /// Record a new commit.
    ///
    /// The first parent must equal the branch head, otherwise the call fails
    /// with [`StoreErrorKind::Conflict`]. An empty parent list is only valid
    /// for the first commit of a new branch. A second parent makes a merge
    /// commit.
    fn create_commit(
        &self,
        repo: &RepoRef,
        commit: &NewCommit<'_>,
    ) -> impl Future<Output = StoreResult<CommitId>> + Send;

    /// Commits reachable from `branch`, most recent first. `page` is 1-based.
    fn list_commits(
        &self,
        repo: &RepoRef,
        branch: &str,
        page: usize,
        page_size: usize,
    ) -> impl Future<Output = StoreResult<Vec<CommitInfo>>> + Send;

    fn list_branches(
        &self,
        repo: &RepoRef,
    ) -> impl Future<Output = StoreResult<Vec<BranchInfo>>> + Send;

    fn create_branch(
        &self,
        repo: &RepoRef,
        name: &str,
        from: &CommitId,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Best common ancestor of two commits
    fn merge_base(
        &self,
        repo: &RepoRef,
        left: &CommitId,
        right: &CommitId,
    ) -> impl Future<Output = StoreResult<CommitId>> + Send;
}

/// Every commit reachable from `start`, including `start` itself
pub(crate) fn ancestors(
    start: &CommitId,
    mut parents_of: impl FnMut(&CommitId) -> StoreResult<Vec<CommitId>>,
) -> StoreResult<HashSet<CommitId>> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([start.clone()]);

    while let Some(commit) = queue.pop_front() {
        if !seen.insert(commit.clone()) {
            continue;
        }
        queue.extend(parents_of(&commit)?);
    }

    Ok(seen)
}

/// Slice one 1-based page out of an ordered list
pub(crate) fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> StoreResult<Vec<T>> {
    if page == 0 || page_size == 0 {
        return Err(StoreError::new(
            StoreErrorKind::Invalid,
            "page and page_size must be at least 1",
        ));
    }
    let skip = (page - 1).saturating_mul(page_size);
    Ok(items.into_iter().skip(skip).take(page_size).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn network_and_timeout_are_retryable() {
        assert!(StoreError::new(StoreErrorKind::Network, "reset").is_retryable());
        assert!(StoreError::new(StoreErrorKind::Timeout, "slow").is_retryable());
        assert!(!StoreError::new(StoreErrorKind::Unauthorized, "token").is_retryable());
        assert!(!StoreError::conflict("stale parent").is_retryable());
    }

    #[test]
    fn locked_backend_is_retryable() {
        assert!(StoreError::new(StoreErrorKind::Backend, "database is locked").is_retryable());
        assert!(!StoreError::new(StoreErrorKind::Backend, "disk image is malformed").is_retryable());
    }

    #[test]
    fn paginate_is_one_based() {
        let items: Vec<u32> = (1..=5).collect();
        assert_eq!(paginate(items.clone(), 1, 2).unwrap(), vec![1, 2]);
        assert_eq!(paginate(items.clone(), 3, 2).unwrap(), vec![5]);
        assert!(paginate(items.clone(), 4, 2).unwrap().is_empty());
        assert!(paginate(items, 0, 2).is_err());
    }

    #[test]
    fn ancestors_follow_every_parent() {
        let id = |value: &str| CommitId::new(value).unwrap();
        let found = ancestors(&id("m"), |commit| {
            Ok(match commit.as_str() {
                "m" => vec![id("a"), id("b")],
                "a" | "b" => vec![id("root")],
                _ => Vec::new(),
            })
        })
        .unwrap();
        assert_eq!(found.len(), 4);
        assert!(found.contains(&id("root")));
    }

    #[test]
    fn conversion_classifies_errors() {
        let error: Error = StoreError::new(StoreErrorKind::Timeout, "slow").into();
        assert!(matches!(error, Error::VersionStoreUnavailable { .. }));

        let error: Error = StoreError::not_found("no such commit").into();
        assert!(matches!(
            error,
            Error::VersionStoreRejected {
                kind: StoreErrorKind::NotFound,
                ..
            }
        ));
    }
}
