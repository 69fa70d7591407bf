use std::path::Path;

use deckhand_core::{codec, detect_conflicts, resolve_merge, DeckSnapshot};

use crate::cli::TakeSide;
use crate::commands::common::{build_resolutions, read_deck, report_conflicts, write_output, Context};
use crate::error::CliError;

pub struct MergeFiles<'a> {
    pub base: &'a Path,
    pub source: &'a Path,
    pub target: &'a Path,
}

/// Merge three deck files. Fails without writing anything while conflicts
/// remain open.
pub async fn run_merge(
    context: &Context,
    files: &MergeFiles<'_>,
    take: Option<TakeSide>,
    raw_resolutions: &[String],
    output_path: Option<&Path>,
) -> Result<DeckSnapshot, CliError> {
    let base = read_deck(files.base)?;
    let source = read_deck(files.source)?;
    let target = read_deck(files.target)?;

    let outcome = detect_conflicts(&base, &source, &target)?;
    let resolutions = build_resolutions(&outcome.conflicts, take, raw_resolutions)?;
    let directory = context.card_directory()?;
    report_conflicts(&directory, &outcome.conflicts, &resolutions).await;

    let merged = resolve_merge(&outcome.auto_merged, &outcome.conflicts, &resolutions)?;
    write_output(output_path, &codec::to_json(&merged)?)?;
    Ok(merged)
}
