use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use deckhand_core::merge::Side;
use deckhand_core::DeckFormat;

#[derive(Parser)]
#[command(name = "deckhand")]
#[command(about = "Version, diff and merge trading-card decks")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local history database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the session config file (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Look card names up on Scryfall when printing changes
    #[arg(long, global = true)]
    pub scryfall: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show what changed between two deck files
    Diff {
        /// Older deck file
        old: PathBuf,
        /// Newer deck file
        new: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Three-way merge deck files
    Merge {
        /// Common ancestor deck file
        base: PathBuf,
        /// Deck file whose changes are merged in
        source: PathBuf,
        /// Deck file being merged into
        target: PathBuf,
        /// Resolve every conflict by taking one side
        #[arg(long, value_enum)]
        take: Option<TakeSide>,
        /// Resolve one conflict, e.g. `main:OGN-001=2` (repeatable)
        #[arg(long = "resolve", value_name = "ZONE:CARD=QTY")]
        resolutions: Vec<String>,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Create a deck repository with an initial commit
    Init {
        /// Repository as `owner/name`, or a bare name
        repo: String,
        /// Game format of the deck
        #[arg(long, value_enum)]
        format: FormatArg,
        /// Deck file for the initial commit (empty deck when omitted)
        #[arg(long, value_name = "PATH")]
        deck: Option<PathBuf>,
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Commit a deck file to a branch
    Commit {
        repo: String,
        /// Deck file to commit
        deck: PathBuf,
        /// Commit message (generated from the changes when omitted)
        #[arg(short, long)]
        message: Option<String>,
        /// Branch to commit to (config default when omitted)
        #[arg(long)]
        branch: Option<String>,
    },
    /// List commits on a branch
    Log {
        repo: String,
        #[arg(long)]
        branch: Option<String>,
        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,
        /// Number of commits per page
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the deck file at a commit
    Show {
        repo: String,
        /// Commit ID, unique ID prefix, or branch name
        revision: String,
    },
    /// Show what changed between two commits
    Compare {
        repo: String,
        /// Commit ID, unique ID prefix, or branch name
        from: String,
        /// Commit ID, unique ID prefix, or branch name
        to: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List or create branches
    Branch {
        #[command(subcommand)]
        command: BranchCommands,
    },
    /// Merge one branch into another
    MergeBranch {
        repo: String,
        /// Branch whose changes are merged in
        source: String,
        /// Branch to merge into (config default when omitted)
        #[arg(long)]
        into: Option<String>,
        /// Resolve every conflict by taking one side
        #[arg(long, value_enum)]
        take: Option<TakeSide>,
        /// Resolve one conflict, e.g. `main:OGN-001=2` (repeatable)
        #[arg(long = "resolve", value_name = "ZONE:CARD=QTY")]
        resolutions: Vec<String>,
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Watch a deck file and auto-save changes after a quiet period
    Watch {
        repo: String,
        /// Deck file to watch
        deck: PathBuf,
        #[arg(long)]
        branch: Option<String>,
        /// How often to check the file for changes
        #[arg(long, value_name = "MS", default_value = "1000")]
        interval_ms: u64,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum BranchCommands {
    /// List branches and their heads
    List {
        repo: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a branch
    Create {
        repo: String,
        name: String,
        /// Commit ID, unique ID prefix, or branch name to start from
        #[arg(long, value_name = "REVISION")]
        from: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TakeSide {
    Base,
    Source,
    Target,
}

impl From<TakeSide> for Side {
    fn from(side: TakeSide) -> Self {
        match side {
            TakeSide::Base => Self::Base,
            TakeSide::Source => Self::Source,
            TakeSide::Target => Self::Target,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Riftbound,
    #[value(name = "mtg-commander", alias = "commander")]
    Commander,
}

impl From<FormatArg> for DeckFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Riftbound => Self::Riftbound,
            FormatArg::Commander => Self::Commander,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Self::Bash,
            CompletionShell::Zsh => Self::Zsh,
            CompletionShell::Fish => Self::Fish,
            CompletionShell::PowerShell => Self::PowerShell,
        }
    }
}
