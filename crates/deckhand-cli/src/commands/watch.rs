use std::path::Path;
use std::time::{Duration, SystemTime};

use deckhand_core::session::{AutoSaver, SaveEvent};
use tokio::sync::broadcast::error::RecvError;

use crate::commands::common::{read_deck, warn_copy_limits, Context};
use crate::error::CliError;

/// Re-read `deck_path` whenever it changes and let the auto-saver commit
/// after the configured quiet period. Ctrl-C flushes pending edits and exits.
pub async fn run_watch(
    context: &Context,
    repo: &str,
    deck_path: &Path,
    branch: Option<&str>,
    interval: Duration,
) -> Result<(), CliError> {
    let session = context.open_session(repo, branch).await?;
    let quiet_period = session.config().quiet_period();
    println!(
        "Watching {} on {} (auto-save after {}s, Ctrl-C to stop)",
        deck_path.display(),
        session.branch(),
        quiet_period.as_secs()
    );

    let saver = AutoSaver::spawn(session);
    let mut events = saver.subscribe();
    let mut ticker = tokio::time::interval(interval);
    let mut last_modified: Option<SystemTime> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let modified = match std::fs::metadata(deck_path).and_then(|meta| meta.modified()) {
                    Ok(modified) => modified,
                    Err(error) => {
                        tracing::warn!(path = %deck_path.display(), "Cannot stat deck file: {}", error);
                        continue;
                    }
                };
                if last_modified == Some(modified) {
                    continue;
                }
                last_modified = Some(modified);
                match read_deck(deck_path) {
                    Ok(snapshot) => {
                        warn_copy_limits(&snapshot);
                        if let Err(error) = saver.edit(snapshot).await {
                            tracing::warn!("Ignoring edit: {}", error);
                        }
                    }
                    // Editors often write files in several steps
                    Err(error) => tracing::warn!("Skipping unreadable deck file: {}", error),
                }
            }
            event = events.recv() => match event {
                Ok(SaveEvent::Committed { commit, message, .. }) => {
                    println!("{}  {message}", commit.short());
                }
                Ok(SaveEvent::Failed { retryable, message, .. }) => {
                    tracing::debug!(retryable, "Auto-save failed");
                    eprintln!("Save failed: {message}; edits are kept until the next save");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Missed save events");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if let Some(commit) = saver.flush().await? {
        println!("{}  saved pending edits", commit.short());
    }
    saver.shutdown().await?;
    Ok(())
}
