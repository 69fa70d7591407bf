use crate::commands::common::{resolve_revision, Context};
use crate::error::CliError;

pub async fn run_branch_list(context: &Context, repo: &str, json: bool) -> Result<(), CliError> {
    let session = context.open_session(repo, None).await?;
    let branches = session.branches().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&branches)?);
        return Ok(());
    }

    for branch in &branches {
        let marker = if branch.name == session.config().default_branch {
            "*"
        } else {
            " "
        };
        println!("{marker} {}  {}", branch.name, branch.head.short());
    }
    Ok(())
}

pub async fn run_branch_create(
    context: &Context,
    repo: &str,
    name: &str,
    from: Option<&str>,
) -> Result<(), CliError> {
    let session = context.open_session(repo, None).await?;
    let start = match from {
        Some(revision) => Some(resolve_revision(&session, revision).await?),
        None => None,
    };
    session.create_branch(name, start.as_ref()).await?;

    let head = start.as_ref().unwrap_or_else(|| session.head());
    println!("Created branch {} at {}", name.trim(), head.short());
    Ok(())
}
