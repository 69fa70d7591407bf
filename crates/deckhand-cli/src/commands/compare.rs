use crate::commands::common::{print_diff, resolve_revision, Context};
use crate::error::CliError;

pub async fn run_compare(
    context: &Context,
    repo: &str,
    from: &str,
    to: &str,
    json: bool,
) -> Result<(), CliError> {
    let session = context.open_session(repo, None).await?;
    let from = resolve_revision(&session, from).await?;
    let to = resolve_revision(&session, to).await?;
    let diff = session.compare(&from, &to).await?;

    let directory = context.card_directory()?;
    print_diff(&directory, &diff, json).await
}
