use std::path::Path;

use deckhand_core::models::CommitId;
use deckhand_core::session::DeckSession;
use deckhand_core::{DeckFormat, DeckSnapshot, Error};

use crate::commands::common::{parse_repo, read_deck, warn_copy_limits, Context};
use crate::error::CliError;

pub async fn run_init(
    context: &Context,
    repo: &str,
    format: DeckFormat,
    deck_path: Option<&Path>,
    message: Option<&str>,
) -> Result<CommitId, CliError> {
    let repo = parse_repo(repo)?;
    let config = context.load_config()?;

    let snapshot = match deck_path {
        Some(path) => read_deck(path)?,
        None => DeckSnapshot::empty(format),
    };
    if snapshot.format() != format {
        return Err(Error::FormatMismatch {
            expected: format,
            found: snapshot.format(),
        }
        .into());
    }
    warn_copy_limits(&snapshot);

    let store = context.open_store()?;
    let session = DeckSession::init(store, repo, snapshot, message, config).await?;
    println!(
        "Initialized {} ({}) on {} at {}",
        session.repo(),
        format,
        session.branch(),
        session.head().short()
    );
    Ok(session.head().clone())
}
