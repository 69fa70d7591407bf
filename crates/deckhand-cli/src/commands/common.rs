use std::collections::BTreeSet;
use std::env;
use std::fmt::Display;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::DateTime;
use deckhand_core::cards::{CardDirectory, ScryfallCardDirectory, StaticCardDirectory};
use deckhand_core::codec;
use deckhand_core::config::SessionConfig;
use deckhand_core::models::{CommitId, CommitInfo, RepoRef};
use deckhand_core::render::{describe_conflicts, describe_diff};
use deckhand_core::session::DeckSession;
use deckhand_core::store::{SqliteVersionStore, VersionStore};
use deckhand_core::{CardId, ConflictSet, DeckDiff, DeckSnapshot, Resolutions};

use crate::cli::TakeSide;
use crate::error::CliError;

const REVISION_SCAN_PAGE_SIZE: usize = 100;
const MAX_AMBIGUOUS_MATCHES: usize = 3;
const BASIC_LANDS: &[&str] = &["plains", "island", "swamp", "mountain", "forest", "wastes"];

/// Paths and switches shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub scryfall: bool,
}

impl Context {
    pub fn resolve(db_path: Option<PathBuf>, config_path: Option<PathBuf>, scryfall: bool) -> Self {
        Self {
            db_path: resolve_db_path(db_path),
            config_path: resolve_config_path(config_path),
            scryfall,
        }
    }

    pub fn load_config(&self) -> Result<SessionConfig, CliError> {
        Ok(SessionConfig::load_from_path(&self.config_path)?)
    }

    pub fn open_store(&self) -> Result<Arc<SqliteVersionStore>, CliError> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = SqliteVersionStore::open(&self.db_path).map_err(deckhand_core::Error::from)?;
        Ok(Arc::new(store))
    }

    pub fn card_directory(&self) -> Result<CliCardDirectory, CliError> {
        if self.scryfall {
            Ok(CliCardDirectory::Scryfall(ScryfallCardDirectory::new()?))
        } else {
            Ok(CliCardDirectory::Offline(StaticCardDirectory::new()))
        }
    }

    /// Open `branch` (or the configured default branch) of `repo`
    pub async fn open_session(
        &self,
        repo: &str,
        branch: Option<&str>,
    ) -> Result<DeckSession<SqliteVersionStore>, CliError> {
        let repo = parse_repo(repo)?;
        let config = self.load_config()?;
        let branch = branch.map_or_else(|| config.default_branch.clone(), str::to_string);
        let store = self.open_store()?;
        Ok(DeckSession::open(store, repo, &branch, config).await?)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("DECKHAND_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deckhand")
        .join("deckhand.db")
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> PathBuf {
    cli_config_path
        .or_else(|| env::var_os("DECKHAND_CONFIG").map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deckhand")
        .join("config.json")
}

pub fn parse_repo(repo: &str) -> Result<RepoRef, CliError> {
    Ok(repo.parse::<RepoRef>()?)
}

/// Name lookup used when printing diffs and conflicts
pub enum CliCardDirectory {
    /// Names embedded in the deck files only
    Offline(StaticCardDirectory),
    Scryfall(ScryfallCardDirectory),
}

impl CardDirectory for CliCardDirectory {
    async fn display_name(&self, id: &CardId) -> deckhand_core::Result<Option<String>> {
        match self {
            Self::Offline(directory) => directory.display_name(id).await,
            Self::Scryfall(directory) => directory.display_name(id).await,
        }
    }
}

pub fn read_deck(path: &Path) -> Result<DeckSnapshot, CliError> {
    let payload = std::fs::read_to_string(path).map_err(|error| deck_file_error(path, error))?;
    codec::from_json(&payload).map_err(|error| deck_file_error(path, error))
}

fn deck_file_error(path: &Path, error: impl Display) -> CliError {
    CliError::DeckFile {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}

/// Write `contents` to `output_path`, or to stdout when omitted
pub fn write_output(output_path: Option<&Path>, contents: &str) -> Result<(), CliError> {
    if let Some(path) = output_path {
        std::fs::write(path, contents)?;
        println!("{}", path.display());
    } else {
        let mut stdout = io::stdout().lock();
        stdout.write_all(contents.as_bytes())?;
        if !contents.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// Parse `zone:card=quantity`
pub fn parse_resolution(raw: &str) -> Result<(String, CardId, u32), CliError> {
    let invalid = || CliError::InvalidResolution(raw.to_string());

    let (zone, rest) = raw.trim().split_once(':').ok_or_else(invalid)?;
    let (card, quantity) = rest.rsplit_once('=').ok_or_else(invalid)?;
    let zone = zone.trim();
    if zone.is_empty() {
        return Err(invalid());
    }
    let card = CardId::new(card.trim()).map_err(|_| invalid())?;
    let quantity = quantity.trim().parse::<u32>().map_err(|_| invalid())?;

    Ok((zone.to_string(), card, quantity))
}

/// `--take` picks a side for every conflict; `--resolve` entries override it
pub fn build_resolutions(
    conflicts: &ConflictSet,
    take: Option<TakeSide>,
    raw_resolutions: &[String],
) -> Result<Resolutions, CliError> {
    let mut resolutions = take.map_or_else(Resolutions::new, |side| {
        conflicts.resolve_all(side.into())
    });
    for raw in raw_resolutions {
        let (zone, card, quantity) = parse_resolution(raw)?;
        resolutions.insert(zone, card, quantity);
    }
    Ok(resolutions)
}

/// Print conflicts to stderr, flagging the ones still open
pub async fn report_conflicts<D: CardDirectory>(
    directory: &D,
    conflicts: &ConflictSet,
    resolutions: &Resolutions,
) {
    if conflicts.is_empty() {
        return;
    }

    let lines = describe_conflicts(directory, conflicts).await;
    let unresolved = resolutions.unresolved(conflicts);
    eprintln!("{} conflict(s), {unresolved} unresolved:", conflicts.len());
    for (conflict, line) in conflicts.iter().zip(lines) {
        let marker = if resolutions.get(&conflict.zone, &conflict.card_id).is_some() {
            "resolved"
        } else {
            "open"
        };
        eprintln!("  {line} ({marker})");
    }
}

pub async fn print_diff<D: CardDirectory>(
    directory: &D,
    diff: &DeckDiff,
    json: bool,
) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(diff)?);
        return Ok(());
    }

    for line in describe_diff(directory, diff).await {
        println!("{line}");
    }
    if !diff.is_empty() {
        let summary = diff.summary();
        println!(
            "{} added, {} removed, {} modified",
            summary.added, summary.removed, summary.modified
        );
    }
    Ok(())
}

pub fn format_commit_line(commit: &CommitInfo) -> String {
    let date = DateTime::from_timestamp_millis(commit.timestamp).map_or_else(
        || "unknown date".to_string(),
        |timestamp| timestamp.format("%Y-%m-%d %H:%M").to_string(),
    );
    let subject = commit.message.lines().next().unwrap_or_default();
    let merge = if commit.is_merge() { " (merge)" } else { "" };
    format!(
        "{}  {date}  {}  {subject}{merge}",
        commit.id.short(),
        commit.author
    )
}

/// Resolve a branch name, full commit ID, or unique commit ID prefix
pub async fn resolve_revision<S: VersionStore>(
    session: &DeckSession<S>,
    revision: &str,
) -> Result<CommitId, CliError> {
    let revision = revision.trim();
    if revision.is_empty() {
        return Err(CliError::EmptyRevision);
    }

    let branches = session.branches().await?;
    if let Some(branch) = branches.iter().find(|branch| branch.name == revision) {
        return Ok(branch.head.clone());
    }

    let mut matching = BTreeSet::new();
    for branch in &branches {
        let mut page = 1;
        loop {
            let commits = session
                .branch_history(&branch.name, page, REVISION_SCAN_PAGE_SIZE)
                .await?;
            let exhausted = commits.len() < REVISION_SCAN_PAGE_SIZE;
            matching.extend(
                commits
                    .into_iter()
                    .map(|commit| commit.id)
                    .filter(|id| id.as_str().starts_with(revision)),
            );
            if exhausted {
                break;
            }
            page += 1;
        }
    }

    if matching.len() == 1 {
        if let Some(commit) = matching.pop_first() {
            return Ok(commit);
        }
    }
    if matching.is_empty() {
        return Err(CliError::UnknownRevision(revision.to_string()));
    }

    let options = matching
        .iter()
        .take(MAX_AMBIGUOUS_MATCHES)
        .map(CommitId::short)
        .collect::<Vec<_>>()
        .join(", ");
    Err(CliError::AmbiguousRevision(format!(
        "Revision '{revision}' matches multiple commits: {options}"
    )))
}

/// Basic lands are exempt from Commander's singleton rule
pub fn is_basic_land(card: &CardId) -> bool {
    let words = card
        .as_str()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>();
    let land = match words.as_slice() {
        [land] => land,
        [snow, covered, land] if snow == "snow" && covered == "covered" => land,
        _ => return false,
    };
    BASIC_LANDS.contains(&land.as_str())
}

pub fn warn_copy_limits(snapshot: &DeckSnapshot) {
    for violation in snapshot.copy_limit_violations(is_basic_land) {
        tracing::warn!(
            zone = %violation.zone,
            card = %violation.card_id,
            quantity = violation.quantity,
            limit = violation.limit,
            "Card exceeds the format's copy limit"
        );
    }
}
