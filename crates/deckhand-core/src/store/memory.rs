//! In-process version store

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;

use super::{
    ancestors, paginate, NewCommit, StoreError, StoreErrorKind, StoreResult, VersionStore,
};
use crate::models::{BranchInfo, CommitId, CommitInfo, DeckSnapshot, RepoRef};

#[derive(Debug, Clone)]
struct StoredCommit {
    info: CommitInfo,
    seq: u64,
    files: BTreeMap<String, DeckSnapshot>,
}

#[derive(Debug, Default)]
struct RepoState {
    commits: HashMap<CommitId, StoredCommit>,
    branches: BTreeMap<String, CommitId>,
    next_seq: u64,
}

impl RepoState {
    fn commit(&self, id: &CommitId) -> StoreResult<&StoredCommit> {
        self.commits
            .get(id)
            .ok_or_else(|| StoreError::not_found(format!("commit {id}")))
    }

    fn head(&self, branch: &str) -> StoreResult<&CommitId> {
        self.branches
            .get(branch)
            .ok_or_else(|| StoreError::not_found(format!("branch {branch}")))
    }

    fn parents_of(&self, id: &CommitId) -> StoreResult<Vec<CommitId>> {
        Ok(self.commit(id)?.info.parents.clone())
    }
}

#[derive(Debug, Default)]
struct State {
    repos: HashMap<RepoRef, RepoState>,
    injected_failures: VecDeque<StoreError>,
}

impl State {
    fn take_failure(&mut self) -> StoreResult<()> {
        self.injected_failures.pop_front().map_or(Ok(()), Err)
    }

    fn repo(&self, repo: &RepoRef) -> StoreResult<&RepoState> {
        self.repos
            .get(repo)
            .ok_or_else(|| StoreError::not_found(format!("repository {repo}")))
    }
}

/// Version store kept entirely in memory.
///
/// Repositories are created by their first parentless commit. Failures can be
/// queued with [`MemoryVersionStore::fail_next`] and commits slowed down with
/// [`MemoryVersionStore::set_commit_latency`] to exercise error handling and
/// commit ordering.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    state: Mutex<State>,
    commit_latency_ms: AtomicU64,
}

impl MemoryVersionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next store call fail with `error`
    pub async fn fail_next(&self, error: StoreError) {
        self.state.lock().await.injected_failures.push_back(error);
    }

    /// Delay every `create_commit` call by `latency`
    pub fn set_commit_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.commit_latency_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of commits stored for `repo`
    pub async fn commit_count(&self, repo: &RepoRef) -> usize {
        self.state
            .lock()
            .await
            .repos
            .get(repo)
            .map_or(0, |state| state.commits.len())
    }
}

impl VersionStore for MemoryVersionStore {
    async fn get_snapshot(
        &self,
        repo: &RepoRef,
        commit: &CommitId,
        path: &str,
    ) -> StoreResult<DeckSnapshot> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        state
            .repo(repo)?
            .commit(commit)?
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("{path} at {commit}")))
    }

    async fn create_commit(&self, repo: &RepoRef, commit: &NewCommit<'_>) -> StoreResult<CommitId> {
        let latency = self.commit_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let mut state = self.state.lock().await;
        state.take_failure()?;
        let repo_state = state.repos.entry(repo.clone()).or_default();

        let head = repo_state.branches.get(commit.branch).cloned();
        let mut files = match (commit.parents.first(), head) {
            (Some(parent), Some(head)) if *parent == head => repo_state.commit(&head)?.files.clone(),
            (Some(parent), Some(head)) => {
                return Err(StoreError::conflict(format!(
                    "branch {} moved: expected {parent}, head is {head}",
                    commit.branch
                )));
            }
            (None, None) => BTreeMap::new(),
            (None, Some(head)) => {
                return Err(StoreError::conflict(format!(
                    "branch {} already exists at {head}",
                    commit.branch
                )));
            }
            (Some(_), None) => {
                return Err(StoreError::not_found(format!("branch {}", commit.branch)));
            }
        };
        for parent in commit.parents.iter().skip(1) {
            repo_state.commit(parent)?;
        }

        files.insert(commit.path.to_string(), commit.snapshot.clone());

        let id = CommitId::generate();
        let seq = repo_state.next_seq;
        repo_state.next_seq += 1;
        repo_state.commits.insert(
            id.clone(),
            StoredCommit {
                info: CommitInfo {
                    id: id.clone(),
                    message: commit.message.to_string(),
                    author: commit.author.to_string(),
                    timestamp: chrono::Utc::now().timestamp_millis(),
                    parents: commit.parents.to_vec(),
                },
                seq,
                files,
            },
        );
        repo_state
            .branches
            .insert(commit.branch.to_string(), id.clone());

        Ok(id)
    }

    async fn list_commits(
        &self,
        repo: &RepoRef,
        branch: &str,
        page: usize,
        page_size: usize,
    ) -> StoreResult<Vec<CommitInfo>> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        let repo_state = state.repo(repo)?;
        let head = repo_state.head(branch)?;

        let reachable = ancestors(head, |id| repo_state.parents_of(id))?;
        let mut commits = reachable
            .iter()
            .map(|id| repo_state.commit(id))
            .collect::<StoreResult<Vec<_>>>()?;
        commits.sort_by(|left, right| right.seq.cmp(&left.seq));

        paginate(
            commits.into_iter().map(|commit| commit.info.clone()).collect(),
            page,
            page_size,
        )
    }

    async fn list_branches(&self, repo: &RepoRef) -> StoreResult<Vec<BranchInfo>> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        Ok(state
            .repo(repo)?
            .branches
            .iter()
            .map(|(name, head)| BranchInfo {
                name: name.clone(),
                head: head.clone(),
            })
            .collect())
    }

    async fn create_branch(&self, repo: &RepoRef, name: &str, from: &CommitId) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        let repo_state = state
            .repos
            .get_mut(repo)
            .ok_or_else(|| StoreError::not_found(format!("repository {repo}")))?;

        if name.trim().is_empty() {
            return Err(StoreError::new(
                StoreErrorKind::Invalid,
                "branch name must not be empty",
            ));
        }
        if repo_state.branches.contains_key(name) {
            return Err(StoreError::conflict(format!("branch {name} already exists")));
        }
        repo_state.commit(from)?;
        repo_state.branches.insert(name.to_string(), from.clone());
        Ok(())
    }

    async fn merge_base(
        &self,
        repo: &RepoRef,
        left: &CommitId,
        right: &CommitId,
    ) -> StoreResult<CommitId> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        let repo_state = state.repo(repo)?;

        let left_ancestors = ancestors(left, |id| repo_state.parents_of(id))?;
        let right_ancestors = ancestors(right, |id| repo_state.parents_of(id))?;

        left_ancestors
            .intersection(&right_ancestors)
            .filter_map(|id| repo_state.commits.get(id))
            .max_by_key(|commit| commit.seq)
            .map(|commit| commit.info.id.clone())
            .ok_or_else(|| {
                StoreError::not_found(format!("no common ancestor of {left} and {right}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeckFormat;
    use pretty_assertions::assert_eq;

    fn repo() -> RepoRef {
        RepoRef::new("alice", "jinx")
    }

    fn deck(quantity: u32) -> DeckSnapshot {
        DeckSnapshot::builder(DeckFormat::Riftbound)
            .add("main", "A", "Alpha", quantity)
            .unwrap()
            .build()
            .unwrap()
    }

    async fn commit(
        store: &MemoryVersionStore,
        branch: &str,
        snapshot: &DeckSnapshot,
        parents: &[CommitId],
    ) -> StoreResult<CommitId> {
        store
            .create_commit(
                &repo(),
                &NewCommit {
                    branch,
                    path: "deck.json",
                    snapshot,
                    message: "update",
                    author: "alice",
                    parents,
                },
            )
            .await
    }

    #[tokio::test]
    async fn commits_are_listed_newest_first() {
        let store = MemoryVersionStore::new();
        let first = commit(&store, "main", &deck(1), &[]).await.unwrap();
        let second = commit(&store, "main", &deck(2), &[first.clone()])
            .await
            .unwrap();

        let commits = store.list_commits(&repo(), "main", 1, 10).await.unwrap();
        let ids: Vec<CommitId> = commits.into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second.clone(), first]);

        let snapshot = store.get_snapshot(&repo(), &second, "deck.json").await.unwrap();
        assert_eq!(snapshot, deck(2));
    }

    #[tokio::test]
    async fn stale_parent_is_a_conflict() {
        let store = MemoryVersionStore::new();
        let first = commit(&store, "main", &deck(1), &[]).await.unwrap();
        commit(&store, "main", &deck(2), &[first.clone()])
            .await
            .unwrap();

        let error = commit(&store, "main", &deck(3), &[first]).await.unwrap_err();
        assert_eq!(error.kind, StoreErrorKind::Conflict);
    }

    #[tokio::test]
    async fn merge_base_finds_fork_point() {
        let store = MemoryVersionStore::new();
        let root = commit(&store, "main", &deck(1), &[]).await.unwrap();
        store.create_branch(&repo(), "spicy", &root).await.unwrap();

        let main_tip = commit(&store, "main", &deck(2), &[root.clone()])
            .await
            .unwrap();
        let spicy_tip = commit(&store, "spicy", &deck(3), &[root.clone()])
            .await
            .unwrap();

        let base = store.merge_base(&repo(), &main_tip, &spicy_tip).await.unwrap();
        assert_eq!(base, root);
    }

    #[tokio::test]
    async fn missing_path_is_not_found() {
        let store = MemoryVersionStore::new();
        let first = commit(&store, "main", &deck(1), &[]).await.unwrap();
        let error = store
            .get_snapshot(&repo(), &first, "other.json")
            .await
            .unwrap_err();
        assert_eq!(error.kind, StoreErrorKind::NotFound);
    }

    #[tokio::test]
    async fn injected_failure_is_consumed_once() {
        let store = MemoryVersionStore::new();
        store
            .fail_next(StoreError::new(StoreErrorKind::Network, "reset"))
            .await;

        let error = commit(&store, "main", &deck(1), &[]).await.unwrap_err();
        assert_eq!(error.kind, StoreErrorKind::Network);
        assert!(commit(&store, "main", &deck(1), &[]).await.is_ok());
        assert_eq!(store.commit_count(&repo()).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn commit_latency_delays_commits() {
        let store = MemoryVersionStore::new();
        store.set_commit_latency(Duration::from_secs(2));
        let started = tokio::time::Instant::now();

        commit(&store, "main", &deck(1), &[]).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn duplicate_branch_is_rejected() {
        let store = MemoryVersionStore::new();
        let root = commit(&store, "main", &deck(1), &[]).await.unwrap();
        let error = store.create_branch(&repo(), "main", &root).await.unwrap_err();
        assert_eq!(error.kind, StoreErrorKind::Conflict);
    }
}
