use std::path::Path;

use deckhand_core::compute_diff;

use crate::commands::common::{print_diff, read_deck, Context};
use crate::error::CliError;

pub async fn run_diff(context: &Context, old: &Path, new: &Path, json: bool) -> Result<(), CliError> {
    let old = read_deck(old)?;
    let new = read_deck(new)?;
    let diff = compute_diff(&old, &new)?;

    let directory = context.card_directory()?;
    print_diff(&directory, &diff, json).await
}
