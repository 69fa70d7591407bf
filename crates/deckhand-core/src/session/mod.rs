//! Deck-editing sessions.
//!
//! A [`DeckSession`] owns one open deck: the current in-memory snapshot, the
//! last committed snapshot, the branch head and the auto-save debounce state.
//! It is the only layer that talks to the version store, and the only layer
//! that turns raw store failures into retryable or terminal errors.

mod autosave;
mod commit_message;
mod debounce;
mod retry;

use std::sync::Arc;

use tokio::time::Instant;

use crate::apply::{resolve_merge, Resolutions};
use crate::config::SessionConfig;
use crate::diff::{compute_diff, DeckDiff};
use crate::error::{Error, Result};
use crate::merge::{detect_conflicts, MergeOutcome};
use crate::models::{BranchInfo, CommitId, CommitInfo, DeckSnapshot, RepoRef};
use crate::store::{NewCommit, StoreError, VersionStore};

pub use autosave::{AutoSaver, SaveEvent};
pub use commit_message::{auto_message, validate_manual_message};
pub use debounce::{DebounceState, Debouncer};
pub use retry::{retry_with_backoff, RetryPolicy};

const INITIAL_COMMIT_MESSAGE: &str = "Initial deck";

/// What triggered a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    Auto,
    Manual,
    Merge,
}

/// A commit that has been prepared but not yet written.
///
/// Holds everything the store needs, so it can be executed without borrowing
/// the session.
#[derive(Debug, Clone)]
pub struct PendingCommit {
    repo: RepoRef,
    branch: String,
    path: String,
    author: String,
    snapshot: DeckSnapshot,
    message: String,
    parents: Vec<CommitId>,
    kind: CommitKind,
}

impl PendingCommit {
    pub const fn kind(&self) -> CommitKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn snapshot(&self) -> &DeckSnapshot {
        &self.snapshot
    }

    /// Write the commit, retrying retryable store failures
    pub async fn execute<S: VersionStore>(&self, store: &S, policy: RetryPolicy) -> Result<CommitId> {
        retry_with_backoff(policy, || async {
            store
                .create_commit(
                    &self.repo,
                    &NewCommit {
                        branch: &self.branch,
                        path: &self.path,
                        snapshot: &self.snapshot,
                        message: &self.message,
                        author: &self.author,
                        parents: &self.parents,
                    },
                )
                .await
                .map_err(Error::from)
        })
        .await
    }
}

/// A branch merge waiting for conflict resolutions
#[derive(Debug, Clone)]
pub struct PendingMerge {
    pub source_branch: String,
    pub target_branch: String,
    pub base: CommitId,
    pub source_head: CommitId,
    pub target_head: CommitId,
    pub outcome: MergeOutcome,
}

impl PendingMerge {
    /// Source is already contained in target; merging changes nothing
    pub fn is_up_to_date(&self) -> bool {
        self.base == self.source_head
    }
}

/// One open deck-editing session
pub struct DeckSession<S> {
    store: Arc<S>,
    repo: RepoRef,
    config: SessionConfig,
    retry: RetryPolicy,
    branch: String,
    head: CommitId,
    current: DeckSnapshot,
    committed: DeckSnapshot,
    debouncer: Debouncer,
}

impl<S: VersionStore> DeckSession<S> {
    /// Create a repository with `snapshot` as its first commit on the
    /// configured default branch
    pub async fn init(
        store: Arc<S>,
        repo: RepoRef,
        snapshot: DeckSnapshot,
        message: Option<&str>,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let message = match message {
            Some(message) => validate_manual_message(message, config.max_message_len)?,
            None => INITIAL_COMMIT_MESSAGE.to_string(),
        };
        let retry = RetryPolicy::from(&config.retry);

        let pending = PendingCommit {
            repo: repo.clone(),
            branch: config.default_branch.clone(),
            path: config.deck_path.clone(),
            author: config.author.clone(),
            snapshot,
            message,
            parents: Vec::new(),
            kind: CommitKind::Manual,
        };
        let head = pending.execute(store.as_ref(), retry).await?;
        tracing::info!(repo = %repo, branch = %pending.branch, commit = %head, "Initialized deck repository");

        Ok(Self {
            store,
            repo,
            retry,
            branch: pending.branch,
            head,
            current: pending.snapshot.clone(),
            committed: pending.snapshot,
            debouncer: Debouncer::new(config.quiet_period()),
            config,
        })
    }

    /// Open `branch` of an existing repository at its head
    pub async fn open(
        store: Arc<S>,
        repo: RepoRef,
        branch: &str,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let retry = RetryPolicy::from(&config.retry);
        let head = branch_head(store.as_ref(), &repo, branch, retry).await?;
        let snapshot = fetch_snapshot(store.as_ref(), &repo, &head, &config.deck_path, retry).await?;
        tracing::debug!(repo = %repo, branch, commit = %head, "Opened deck session");

        Ok(Self {
            store,
            repo,
            retry,
            branch: branch.to_string(),
            head,
            current: snapshot.clone(),
            committed: snapshot,
            debouncer: Debouncer::new(config.quiet_period()),
            config,
        })
    }

    pub const fn repo(&self) -> &RepoRef {
        &self.repo
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub const fn head(&self) -> &CommitId {
        &self.head
    }

    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Snapshot being edited
    pub const fn current(&self) -> &DeckSnapshot {
        &self.current
    }

    /// Snapshot at the branch head
    pub const fn committed(&self) -> &DeckSnapshot {
        &self.committed
    }

    pub const fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    /// Replace the current snapshot and restart the auto-save quiet period
    pub fn edit(&mut self, snapshot: DeckSnapshot) -> Result<()> {
        if snapshot.format() != self.current.format() {
            return Err(Error::FormatMismatch {
                expected: self.current.format(),
                found: snapshot.format(),
            });
        }
        self.current = snapshot;
        self.debouncer.on_edit(Instant::now());
        Ok(())
    }

    /// Whether the current snapshot differs from the committed one
    pub fn is_dirty(&self) -> bool {
        self.current != self.committed
    }

    /// Changes not yet committed
    pub fn pending_diff(&self) -> Result<DeckDiff> {
        compute_diff(&self.committed, &self.current)
    }

    /// Prepare an automatic commit of the current snapshot.
    ///
    /// Returns `None` (and disarms the timer) when there is nothing to save.
    pub fn prepare_auto(&mut self) -> Result<Option<PendingCommit>> {
        if !self.is_dirty() {
            self.debouncer.cancel_pending();
            return Ok(None);
        }
        let message = auto_message(&self.pending_diff()?);
        self.prepare(message, vec![self.head.clone()], CommitKind::Auto)
            .map(Some)
    }

    /// Prepare a manual commit with a user-supplied message.
    ///
    /// Cancels a pending auto-save timer.
    pub fn prepare_manual(&mut self, message: &str) -> Result<PendingCommit> {
        let message = validate_manual_message(message, self.config.max_message_len)?;
        self.prepare(message, vec![self.head.clone()], CommitKind::Manual)
    }

    fn prepare(
        &mut self,
        message: String,
        parents: Vec<CommitId>,
        kind: CommitKind,
    ) -> Result<PendingCommit> {
        if !self.debouncer.begin_commit() {
            return Err(Error::InvalidInput(
                "a commit is already in progress for this deck".to_string(),
            ));
        }
        Ok(PendingCommit {
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            path: self.config.deck_path.clone(),
            author: self.config.author.clone(),
            snapshot: self.current.clone(),
            message,
            parents,
            kind,
        })
    }

    /// Record the outcome of an executed commit.
    ///
    /// On failure the in-memory snapshot is left untouched so the edits can
    /// be saved again.
    pub fn finish_commit(
        &mut self,
        pending: &PendingCommit,
        result: Result<CommitId>,
    ) -> Result<CommitId> {
        self.debouncer.finish_commit(Instant::now());
        match result {
            Ok(id) => {
                self.head = id.clone();
                self.committed = pending.snapshot.clone();
                tracing::info!(
                    repo = %self.repo,
                    branch = %self.branch,
                    commit = %id,
                    kind = ?pending.kind,
                    "Committed deck: {}",
                    pending.message
                );
                Ok(id)
            }
            Err(error) => {
                tracing::warn!(
                    repo = %self.repo,
                    branch = %self.branch,
                    kind = ?pending.kind,
                    retryable = error.is_retryable(),
                    "Commit failed: {}",
                    error
                );
                Err(error)
            }
        }
    }

    async fn commit(&mut self, pending: PendingCommit) -> Result<CommitId> {
        let result = pending.execute(self.store.as_ref(), self.retry).await;
        self.finish_commit(&pending, result)
    }

    /// Commit pending edits with a generated message.
    ///
    /// Returns `None` when there is nothing to save.
    pub async fn save_auto(&mut self) -> Result<Option<CommitId>> {
        match self.prepare_auto()? {
            Some(pending) => self.commit(pending).await.map(Some),
            None => Ok(None),
        }
    }

    /// Commit the current snapshot with a user-supplied message
    pub async fn save_manual(&mut self, message: &str) -> Result<CommitId> {
        let pending = self.prepare_manual(message)?;
        self.commit(pending).await
    }

    /// Commits on the session's branch, newest first. `page` is 1-based.
    pub async fn history(&self, page: usize, page_size: usize) -> Result<Vec<CommitInfo>> {
        self.branch_history(&self.branch, page, page_size).await
    }

    /// Commits on `branch`, newest first
    pub async fn branch_history(
        &self,
        branch: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<CommitInfo>> {
        retry_with_backoff(self.retry, || async {
            self.store
                .list_commits(&self.repo, branch, page, page_size)
                .await
                .map_err(Error::from)
        })
        .await
    }

    pub async fn branches(&self) -> Result<Vec<BranchInfo>> {
        retry_with_backoff(self.retry, || async {
            self.store
                .list_branches(&self.repo)
                .await
                .map_err(Error::from)
        })
        .await
    }

    /// Deck file at a historical commit
    pub async fn snapshot_at(&self, commit: &CommitId) -> Result<DeckSnapshot> {
        fetch_snapshot(
            self.store.as_ref(),
            &self.repo,
            commit,
            &self.config.deck_path,
            self.retry,
        )
        .await
    }

    /// Diff between the deck at two commits
    pub async fn compare(&self, from: &CommitId, to: &CommitId) -> Result<DeckDiff> {
        let old = self.snapshot_at(from).await?;
        let new = self.snapshot_at(to).await?;
        compute_diff(&old, &new)
    }

    /// Create a branch at `from`, or at the session's head
    pub async fn create_branch(&self, name: &str, from: Option<&CommitId>) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "branch name must not be empty".to_string(),
            ));
        }
        let from = from.unwrap_or(&self.head);

        retry_with_backoff(self.retry, || async {
            self.store
                .create_branch(&self.repo, name, from)
                .await
                .map_err(Error::from)
        })
        .await?;
        tracing::info!(repo = %self.repo, branch = name, from = %from, "Created branch");
        Ok(())
    }

    /// Move the session to another branch's head.
    ///
    /// Refused while there are unsaved edits.
    pub async fn switch_branch(&mut self, name: &str) -> Result<()> {
        self.ensure_clean("switching branches")?;

        let head = branch_head(self.store.as_ref(), &self.repo, name, self.retry).await?;
        let snapshot = self.snapshot_at(&head).await?;

        self.branch = name.to_string();
        self.head = head;
        self.current = snapshot.clone();
        self.committed = snapshot;
        self.debouncer.cancel_pending();
        tracing::info!(repo = %self.repo, branch = name, commit = %self.head, "Switched branch");
        Ok(())
    }

    /// Three-way compare `source_branch` into the session's branch.
    ///
    /// Refused while there are unsaved edits.
    pub async fn begin_merge(&self, source_branch: &str) -> Result<PendingMerge> {
        self.ensure_clean("merging")?;
        if source_branch == self.branch {
            return Err(Error::InvalidInput(format!(
                "cannot merge branch '{source_branch}' into itself"
            )));
        }

        let source_head =
            branch_head(self.store.as_ref(), &self.repo, source_branch, self.retry).await?;
        let base = retry_with_backoff(self.retry, || async {
            self.store
                .merge_base(&self.repo, &self.head, &source_head)
                .await
                .map_err(Error::from)
        })
        .await?;

        let base_snapshot = self.snapshot_at(&base).await?;
        let source_snapshot = self.snapshot_at(&source_head).await?;
        let outcome = detect_conflicts(&base_snapshot, &source_snapshot, &self.committed)?;

        tracing::info!(
            repo = %self.repo,
            source = source_branch,
            target = %self.branch,
            base = %base,
            conflicts = outcome.conflicts.len(),
            "Prepared merge"
        );

        Ok(PendingMerge {
            source_branch: source_branch.to_string(),
            target_branch: self.branch.clone(),
            base,
            source_head,
            target_head: self.head.clone(),
            outcome,
        })
    }

    /// Resolve a pending merge and commit it with both heads as parents.
    ///
    /// Every conflict must have a resolution; the session's branch must not
    /// have moved since [`DeckSession::begin_merge`].
    pub async fn complete_merge(
        &mut self,
        pending: &PendingMerge,
        resolutions: &Resolutions,
        message: Option<&str>,
    ) -> Result<CommitId> {
        if pending.target_branch != self.branch || pending.target_head != self.head {
            return Err(Error::InvalidInput(format!(
                "branch '{}' moved since the merge was prepared",
                pending.target_branch
            )));
        }
        self.ensure_clean("merging")?;

        let merged = resolve_merge(
            &pending.outcome.auto_merged,
            &pending.outcome.conflicts,
            resolutions,
        )?;
        let message = match message {
            Some(message) => validate_manual_message(message, self.config.max_message_len)?,
            None => format!(
                "Merge branch '{}' into {}",
                pending.source_branch, pending.target_branch
            ),
        };

        let previous = std::mem::replace(&mut self.current, merged);
        let commit = self.prepare(
            message,
            vec![pending.target_head.clone(), pending.source_head.clone()],
            CommitKind::Merge,
        );
        let result = match commit {
            Ok(commit) => self.commit(commit).await,
            Err(error) => Err(error),
        };
        if result.is_err() {
            self.current = previous;
        }
        result
    }

    fn ensure_clean(&self, action: &str) -> Result<()> {
        if self.is_dirty() {
            return Err(Error::InvalidInput(format!(
                "unsaved edits must be committed before {action}"
            )));
        }
        Ok(())
    }
}

async fn branch_head<S: VersionStore>(
    store: &S,
    repo: &RepoRef,
    branch: &str,
    retry: RetryPolicy,
) -> Result<CommitId> {
    let branches = retry_with_backoff(retry, || async {
        store.list_branches(repo).await.map_err(Error::from)
    })
    .await?;

    branches
        .into_iter()
        .find(|info| info.name == branch)
        .map(|info| info.head)
        .ok_or_else(|| StoreError::not_found(format!("branch {branch}")).into())
}

async fn fetch_snapshot<S: VersionStore>(
    store: &S,
    repo: &RepoRef,
    commit: &CommitId,
    path: &str,
    retry: RetryPolicy,
) -> Result<DeckSnapshot> {
    retry_with_backoff(retry, || async {
        store
            .get_snapshot(repo, commit, path)
            .await
            .map_err(Error::from)
    })
    .await
}
