//! Deckhand CLI - version history for trading-card decks
//!
//! Diff and merge deck files, and keep a branchable commit history of a deck
//! in a local database.

mod cli;
mod commands;
mod error;

use std::time::Duration;

use clap::Parser;

use crate::cli::{BranchCommands, Cli, Commands};
use crate::commands::branch::{run_branch_create, run_branch_list};
use crate::commands::commit::run_commit;
use crate::commands::common::Context;
use crate::commands::compare::run_compare;
use crate::commands::completions::run_completions;
use crate::commands::diff::run_diff;
use crate::commands::init::run_init;
use crate::commands::log::run_log;
use crate::commands::merge::{run_merge, MergeFiles};
use crate::commands::merge_branch::{run_merge_branch, MergeChoices};
use crate::commands::show::run_show;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "deckhand=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = Context::resolve(cli.db_path, cli.config, cli.scryfall);

    match cli.command {
        Commands::Diff { old, new, json } => run_diff(&context, &old, &new, json).await,
        Commands::Merge {
            base,
            source,
            target,
            take,
            resolutions,
            output,
        } => {
            let files = MergeFiles {
                base: &base,
                source: &source,
                target: &target,
            };
            run_merge(&context, &files, take, &resolutions, output.as_deref())
                .await
                .map(|_| ())
        }
        Commands::Init {
            repo,
            format,
            deck,
            message,
        } => run_init(
            &context,
            &repo,
            format.into(),
            deck.as_deref(),
            message.as_deref(),
        )
        .await
        .map(|_| ()),
        Commands::Commit {
            repo,
            deck,
            message,
            branch,
        } => run_commit(
            &context,
            &repo,
            &deck,
            message.as_deref(),
            branch.as_deref(),
        )
        .await
        .map(|_| ()),
        Commands::Log {
            repo,
            branch,
            page,
            limit,
            json,
        } => run_log(&context, &repo, branch.as_deref(), page, limit, json).await,
        Commands::Show { repo, revision } => run_show(&context, &repo, &revision).await,
        Commands::Compare {
            repo,
            from,
            to,
            json,
        } => run_compare(&context, &repo, &from, &to, json).await,
        Commands::Branch { command } => match command {
            BranchCommands::List { repo, json } => run_branch_list(&context, &repo, json).await,
            BranchCommands::Create { repo, name, from } => {
                run_branch_create(&context, &repo, &name, from.as_deref()).await
            }
        },
        Commands::MergeBranch {
            repo,
            source,
            into,
            take,
            resolutions,
            message,
        } => {
            let choices = MergeChoices {
                take,
                resolutions: &resolutions,
                message: message.as_deref(),
            };
            run_merge_branch(&context, &repo, &source, into.as_deref(), &choices)
                .await
                .map(|_| ())
        }
        Commands::Watch {
            repo,
            deck,
            branch,
            interval_ms,
        } => {
            let interval = Duration::from_millis(interval_ms.max(1));
            run_watch(&context, &repo, &deck, branch.as_deref(), interval).await
        }
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    }
}
