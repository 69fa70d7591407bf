use deckhand_core::codec;

use crate::commands::common::{resolve_revision, write_output, Context};
use crate::error::CliError;

pub async fn run_show(context: &Context, repo: &str, revision: &str) -> Result<(), CliError> {
    let session = context.open_session(repo, None).await?;
    let commit = resolve_revision(&session, revision).await?;
    let snapshot = session.snapshot_at(&commit).await?;
    write_output(None, &codec::to_json(&snapshot)?)
}
