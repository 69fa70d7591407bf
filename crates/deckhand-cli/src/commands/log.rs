use crate::commands::common::{format_commit_line, Context};
use crate::error::CliError;

pub async fn run_log(
    context: &Context,
    repo: &str,
    branch: Option<&str>,
    page: usize,
    limit: usize,
    json: bool,
) -> Result<(), CliError> {
    let session = context.open_session(repo, branch).await?;
    let commits = session.history(page.max(1), limit.max(1)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&commits)?);
        return Ok(());
    }

    if commits.is_empty() {
        println!("No commits on page {page}");
        return Ok(());
    }

    for commit in &commits {
        println!("{}", format_commit_line(commit));
    }
    Ok(())
}
