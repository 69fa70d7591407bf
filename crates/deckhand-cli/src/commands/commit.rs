use std::path::Path;

use deckhand_core::models::CommitId;

use crate::commands::common::{read_deck, warn_copy_limits, Context};
use crate::error::CliError;

/// Commit a deck file. Without a message nothing is recorded when the file
/// matches the branch head.
pub async fn run_commit(
    context: &Context,
    repo: &str,
    deck_path: &Path,
    message: Option<&str>,
    branch: Option<&str>,
) -> Result<Option<CommitId>, CliError> {
    let mut session = context.open_session(repo, branch).await?;
    let snapshot = read_deck(deck_path)?;
    warn_copy_limits(&snapshot);
    session.edit(snapshot)?;

    let commit = match message {
        Some(message) => Some(session.save_manual(message).await?),
        None => session.save_auto().await?,
    };

    match &commit {
        Some(commit) => println!("[{} {}] committed", session.branch(), commit.short()),
        None => println!("Nothing to commit on {}", session.branch()),
    }
    Ok(commit)
}
