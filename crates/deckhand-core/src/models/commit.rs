//! Version history models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Identifier of a commit in the version store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    /// Wrap a store-issued commit identifier
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("commit id must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Create a fresh time-sortable commit ID using UUID v7
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First characters of the id, for compact listings
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommitId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Repository holding one deck's history
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = Error;

    /// Parse `owner/name`, or a bare `name` owned by `local`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (owner, name) = s.split_once('/').unwrap_or(("local", s));
        if owner.trim().is_empty() || name.trim().is_empty() || name.contains('/') {
            return Err(Error::InvalidInput(format!("invalid repository '{s}'")));
        }
        Ok(Self::new(owner.trim(), name.trim()))
    }
}

/// A commit as listed in history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: CommitId,
    pub message: String,
    pub author: String,
    /// Commit timestamp (Unix ms)
    pub timestamp: i64,
    /// Parent commits; two parents mark a merge commit
    #[serde(default)]
    pub parents: Vec<CommitId>,
}

impl CommitInfo {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// A branch and the commit it points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub head: CommitId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_commit_ids_are_unique() {
        assert_ne!(CommitId::generate(), CommitId::generate());
    }

    #[test]
    fn short_id_truncates() {
        let id = CommitId::new("0123456789abcdef").unwrap();
        assert_eq!(id.short(), "0123456789ab");
        let tiny = CommitId::new("abc").unwrap();
        assert_eq!(tiny.short(), "abc");
    }

    #[test]
    fn repo_ref_parses_owner_and_name() {
        let repo: RepoRef = "alice/jinx-aggro".parse().unwrap();
        assert_eq!(repo, RepoRef::new("alice", "jinx-aggro"));

        let bare: RepoRef = "atraxa".parse().unwrap();
        assert_eq!(bare.owner, "local");
        assert_eq!(bare.to_string(), "local/atraxa");

        assert!("a/b/c".parse::<RepoRef>().is_err());
        assert!("/deck".parse::<RepoRef>().is_err());
    }
}
