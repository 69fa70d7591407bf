//! SQLite-backed local version store

#![allow(clippy::cast_possible_wrap)] // SQLite stores positions and sequence numbers as i64

use std::collections::HashMap;
use std::path::Path;

use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use super::{
    ancestors, migrations, paginate, NewCommit, StoreError, StoreErrorKind, StoreResult,
    VersionStore,
};
use crate::codec;
use crate::models::{BranchInfo, CommitId, CommitInfo, DeckSnapshot, RepoRef};

fn backend(error: rusqlite::Error) -> StoreError {
    StoreError::new(StoreErrorKind::Backend, error.to_string())
}

/// Commit graph of one repository, loaded for ancestry walks
struct CommitGraph {
    commits: HashMap<CommitId, (i64, CommitInfo)>,
}

impl CommitGraph {
    fn load(conn: &Connection, repo_id: i64) -> StoreResult<Self> {
        let mut stmt = conn
            .prepare(
                "SELECT id, seq, message, author, timestamp FROM commits WHERE repo_id = ?",
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![repo_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .map_err(backend)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(backend)?;

        let mut commits = HashMap::with_capacity(rows.len());
        for (id, seq, message, author, timestamp) in rows {
            let id = parse_commit_id(id)?;
            commits.insert(
                id.clone(),
                (
                    seq,
                    CommitInfo {
                        id,
                        message,
                        author,
                        timestamp,
                        parents: Vec::new(),
                    },
                ),
            );
        }

        let mut stmt = conn
            .prepare(
                "SELECT p.commit_id, p.parent_id
                 FROM commit_parents p
                 JOIN commits c ON c.id = p.commit_id
                 WHERE c.repo_id = ?
                 ORDER BY p.commit_id, p.position",
            )
            .map_err(backend)?;
        let edges = stmt
            .query_map(params![repo_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(backend)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(backend)?;

        for (child, parent) in edges {
            let child = parse_commit_id(child)?;
            let parent = parse_commit_id(parent)?;
            if let Some((_, info)) = commits.get_mut(&child) {
                info.parents.push(parent);
            }
        }

        Ok(Self { commits })
    }

    fn get(&self, id: &CommitId) -> StoreResult<&(i64, CommitInfo)> {
        self.commits
            .get(id)
            .ok_or_else(|| StoreError::not_found(format!("commit {id}")))
    }

    fn ancestors(&self, start: &CommitId) -> StoreResult<Vec<&(i64, CommitInfo)>> {
        let reachable = ancestors(start, |id| Ok(self.get(id)?.1.parents.clone()))?;
        reachable.iter().map(|id| self.get(id)).collect()
    }
}

fn parse_commit_id(raw: String) -> StoreResult<CommitId> {
    CommitId::new(raw).map_err(|error| StoreError::new(StoreErrorKind::Backend, error.to_string()))
}

/// Commit ready to insert, with the deck already encoded
struct EncodedCommit {
    branch: String,
    path: String,
    content: String,
    message: String,
    author: String,
    parents: Vec<CommitId>,
}

impl EncodedCommit {
    fn encode(commit: &NewCommit<'_>) -> StoreResult<Self> {
        let content = codec::to_json(commit.snapshot)
            .map_err(|error| StoreError::new(StoreErrorKind::Invalid, error.to_string()))?;
        Ok(Self {
            branch: commit.branch.to_string(),
            path: commit.path.to_string(),
            content,
            message: commit.message.to_string(),
            author: commit.author.to_string(),
            parents: commit.parents.to_vec(),
        })
    }
}

/// Version store persisted in a local SQLite database.
///
/// Each commit records the full set of deck files as of that commit. The
/// connection is only touched from tokio's blocking pool, so a busy database
/// never stalls the async workers.
pub struct SqliteVersionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteVersionStore {
    /// Open a store at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(backend)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (useful for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> StoreResult<Self> {
        // WAL is unavailable for in-memory databases.
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(backend)?;
        conn.busy_timeout(std::time::Duration::from_secs(2))
            .map_err(backend)?;
        migrations::run(&mut conn).map_err(backend)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `op` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| StoreError::new(StoreErrorKind::Backend, "database lock poisoned"))?;
            op(&mut conn)
        })
        .await
        .map_err(|error| {
            StoreError::new(
                StoreErrorKind::Backend,
                format!("database task failed: {error}"),
            )
        })?
    }

    fn repo_id(conn: &Connection, repo: &RepoRef) -> StoreResult<Option<i64>> {
        conn.query_row(
            "SELECT id FROM repos WHERE owner = ? AND name = ?",
            params![repo.owner, repo.name],
            |row| row.get(0),
        )
        .optional()
        .map_err(backend)
    }

    fn require_repo(conn: &Connection, repo: &RepoRef) -> StoreResult<i64> {
        Self::repo_id(conn, repo)?
            .ok_or_else(|| StoreError::not_found(format!("repository {repo}")))
    }

    fn branch_head(conn: &Connection, repo_id: i64, branch: &str) -> StoreResult<Option<CommitId>> {
        conn.query_row(
            "SELECT head FROM branches WHERE repo_id = ? AND name = ?",
            params![repo_id, branch],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(backend)?
        .map(parse_commit_id)
        .transpose()
    }

    fn commit_exists(conn: &Connection, repo_id: i64, id: &CommitId) -> StoreResult<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM commits WHERE id = ? AND repo_id = ?)",
            params![id.as_str(), repo_id],
            |row| row.get(0),
        )
        .map_err(backend)
    }

    fn ensure_repo(tx: &Transaction<'_>, repo: &RepoRef) -> StoreResult<i64> {
        if let Some(id) = Self::repo_id(tx, repo)? {
            return Ok(id);
        }
        tx.execute(
            "INSERT INTO repos (owner, name, created_at) VALUES (?, ?, ?)",
            params![
                repo.owner,
                repo.name,
                chrono::Utc::now().timestamp_millis()
            ],
        )
        .map_err(backend)?;
        tracing::info!(repo = %repo, "Created repository");
        Ok(tx.last_insert_rowid())
    }

    fn insert_commit(tx: &Transaction<'_>, repo: &RepoRef, commit: &EncodedCommit) -> StoreResult<CommitId> {
        let branch = commit.branch.as_str();
        let repo_id = Self::ensure_repo(tx, repo)?;
        let head = Self::branch_head(tx, repo_id, branch)?;

        match (commit.parents.first(), &head) {
            (Some(parent), Some(head)) if parent == head => {}
            (Some(parent), Some(head)) => {
                return Err(StoreError::conflict(format!(
                    "branch {branch} moved: expected {parent}, head is {head}"
                )));
            }
            (None, None) => {}
            (None, Some(head)) => {
                return Err(StoreError::conflict(format!(
                    "branch {branch} already exists at {head}"
                )));
            }
            (Some(_), None) => {
                return Err(StoreError::not_found(format!("branch {branch}")));
            }
        }
        for parent in commit.parents.iter().skip(1) {
            if !Self::commit_exists(tx, repo_id, parent)? {
                return Err(StoreError::not_found(format!("commit {parent}")));
            }
        }

        let id = CommitId::generate();
        let seq: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM commits WHERE repo_id = ?",
                params![repo_id],
                |row| row.get(0),
            )
            .map_err(backend)?;

        tx.execute(
            "INSERT INTO commits (id, repo_id, seq, message, author, timestamp) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                id.as_str(),
                repo_id,
                seq,
                commit.message,
                commit.author,
                chrono::Utc::now().timestamp_millis()
            ],
        )
        .map_err(backend)?;

        for (position, parent) in commit.parents.iter().enumerate() {
            tx.execute(
                "INSERT INTO commit_parents (commit_id, position, parent_id) VALUES (?, ?, ?)",
                params![id.as_str(), position as i64, parent.as_str()],
            )
            .map_err(backend)?;
        }

        if let Some(head) = &head {
            tx.execute(
                "INSERT INTO commit_files (commit_id, path, content)
                 SELECT ?, path, content FROM commit_files WHERE commit_id = ?",
                params![id.as_str(), head.as_str()],
            )
            .map_err(backend)?;
        }
        tx.execute(
            "INSERT INTO commit_files (commit_id, path, content) VALUES (?, ?, ?)
             ON CONFLICT (commit_id, path) DO UPDATE SET content = excluded.content",
            params![id.as_str(), commit.path, commit.content],
        )
        .map_err(backend)?;

        tx.execute(
            "INSERT INTO branches (repo_id, name, head) VALUES (?, ?, ?)
             ON CONFLICT (repo_id, name) DO UPDATE SET head = excluded.head",
            params![repo_id, branch, id.as_str()],
        )
        .map_err(backend)?;

        Ok(id)
    }
}

impl VersionStore for SqliteVersionStore {
    async fn get_snapshot(
        &self,
        repo: &RepoRef,
        commit: &CommitId,
        path: &str,
    ) -> StoreResult<DeckSnapshot> {
        let (repo, id, file) = (repo.clone(), commit.clone(), path.to_string());
        let content = self
            .with_conn(move |conn| {
                let repo_id = Self::require_repo(conn, &repo)?;
                if !Self::commit_exists(conn, repo_id, &id)? {
                    return Err(StoreError::not_found(format!("commit {id}")));
                }

                conn.query_row(
                    "SELECT content FROM commit_files WHERE commit_id = ? AND path = ?",
                    params![id.as_str(), file],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map_err(backend)?
                .ok_or_else(|| StoreError::not_found(format!("{file} at {id}")))
            })
            .await?;

        codec::from_json(&content).map_err(|error| {
            StoreError::new(
                StoreErrorKind::Backend,
                format!("stored deck file {path} at {commit} is unreadable: {error}"),
            )
        })
    }

    async fn create_commit(&self, repo: &RepoRef, commit: &NewCommit<'_>) -> StoreResult<CommitId> {
        let encoded = EncodedCommit::encode(commit)?;
        let repo = repo.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(backend)?;
            let id = Self::insert_commit(&tx, &repo, &encoded)?;
            tx.commit().map_err(backend)?;
            tracing::debug!(repo = %repo, branch = %encoded.branch, commit = %id, "Stored commit");
            Ok(id)
        })
        .await
    }

    async fn list_commits(
        &self,
        repo: &RepoRef,
        branch: &str,
        page: usize,
        page_size: usize,
    ) -> StoreResult<Vec<CommitInfo>> {
        let (repo, branch) = (repo.clone(), branch.to_string());
        self.with_conn(move |conn| {
            let repo_id = Self::require_repo(conn, &repo)?;
            let head = Self::branch_head(conn, repo_id, &branch)?
                .ok_or_else(|| StoreError::not_found(format!("branch {branch}")))?;

            let graph = CommitGraph::load(conn, repo_id)?;
            let mut commits = graph.ancestors(&head)?;
            commits.sort_by(|left, right| right.0.cmp(&left.0));

            paginate(
                commits.into_iter().map(|(_, info)| info.clone()).collect(),
                page,
                page_size,
            )
        })
        .await
    }

    async fn list_branches(&self, repo: &RepoRef) -> StoreResult<Vec<BranchInfo>> {
        let repo = repo.clone();
        self.with_conn(move |conn| {
            let repo_id = Self::require_repo(conn, &repo)?;

            let mut stmt = conn
                .prepare("SELECT name, head FROM branches WHERE repo_id = ? ORDER BY name")
                .map_err(backend)?;
            let rows = stmt
                .query_map(params![repo_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(backend)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(backend)?;

            rows.into_iter()
                .map(|(name, head)| {
                    Ok(BranchInfo {
                        name,
                        head: parse_commit_id(head)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn create_branch(&self, repo: &RepoRef, name: &str, from: &CommitId) -> StoreResult<()> {
        if name.trim().is_empty() {
            return Err(StoreError::new(
                StoreErrorKind::Invalid,
                "branch name must not be empty",
            ));
        }

        let (repo, name, from) = (repo.clone(), name.to_string(), from.clone());
        self.with_conn(move |conn| {
            let repo_id = Self::require_repo(conn, &repo)?;
            if Self::branch_head(conn, repo_id, &name)?.is_some() {
                return Err(StoreError::conflict(format!("branch {name} already exists")));
            }
            if !Self::commit_exists(conn, repo_id, &from)? {
                return Err(StoreError::not_found(format!("commit {from}")));
            }

            conn.execute(
                "INSERT INTO branches (repo_id, name, head) VALUES (?, ?, ?)",
                params![repo_id, name, from.as_str()],
            )
            .map_err(backend)?;
            tracing::info!(repo = %repo, branch = %name, from = %from, "Created branch");
            Ok(())
        })
        .await
    }

    async fn merge_base(
        &self,
        repo: &RepoRef,
        left: &CommitId,
        right: &CommitId,
    ) -> StoreResult<CommitId> {
        let (repo, left, right) = (repo.clone(), left.clone(), right.clone());
        self.with_conn(move |conn| {
            let repo_id = Self::require_repo(conn, &repo)?;
            let graph = CommitGraph::load(conn, repo_id)?;

            let left_ancestors = ancestors(&left, |id| Ok(graph.get(id)?.1.parents.clone()))?;
            let right_ancestors = ancestors(&right, |id| Ok(graph.get(id)?.1.parents.clone()))?;

            left_ancestors
                .intersection(&right_ancestors)
                .filter_map(|id| graph.commits.get(id))
                .max_by_key(|(seq, _)| *seq)
                .map(|(_, info)| info.id.clone())
                .ok_or_else(|| {
                    StoreError::not_found(format!("no common ancestor of {left} and {right}"))
                })
        })
        .await
    }
}
