use deckhand_core::models::CommitId;
use deckhand_core::Error;

use crate::cli::TakeSide;
use crate::commands::common::{build_resolutions, report_conflicts, Context};
use crate::error::CliError;

pub struct MergeChoices<'a> {
    pub take: Option<TakeSide>,
    pub resolutions: &'a [String],
    pub message: Option<&'a str>,
}

/// Merge `source` into `into` (or the default branch).
///
/// Returns `None` when the source is already contained in the target.
pub async fn run_merge_branch(
    context: &Context,
    repo: &str,
    source: &str,
    into: Option<&str>,
    choices: &MergeChoices<'_>,
) -> Result<Option<CommitId>, CliError> {
    let mut session = context.open_session(repo, into).await?;
    let pending = session.begin_merge(source).await?;
    if pending.is_up_to_date() {
        println!("Already up to date with {source}");
        return Ok(None);
    }

    let conflicts = &pending.outcome.conflicts;
    let resolutions = build_resolutions(conflicts, choices.take, choices.resolutions)?;
    let directory = context.card_directory()?;
    report_conflicts(&directory, conflicts, &resolutions).await;

    let unresolved = resolutions.unresolved(conflicts);
    if unresolved > 0 {
        return Err(Error::UnresolvedConflicts { count: unresolved }.into());
    }

    let commit = session
        .complete_merge(&pending, &resolutions, choices.message)
        .await?;
    println!(
        "Merged {} into {} at {}",
        pending.source_branch,
        pending.target_branch,
        commit.short()
    );
    Ok(Some(commit))
}
