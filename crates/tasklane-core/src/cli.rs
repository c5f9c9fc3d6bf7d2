use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::task::Priority;
use crate::view::{Category, SortKey};

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tasklane",
    version,
    about = "Tasklane: command-line client for a remote todo service",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Config file to read instead of the default location.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Override a config key, e.g. `--set api.base_url=http://localhost:8000`.
    #[arg(
        long = "set",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in and remember the session.
    Login {
        username: String,
        /// Falls back to $TASKLANE_PASSWORD, then a prompt.
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account.
    Register {
        name: String,
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session.
    Logout,
    /// Show tasks through the list filters.
    List(ListArgs),
    /// Create a task with the given title.
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },
    /// Show one task in full.
    Show { id: String },
    /// Flip completion of the given tasks, one after another.
    #[command(alias = "toggle")]
    Done {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },
    /// Change fields of one task.
    Edit(EditArgs),
    /// Delete the given tasks after confirmation.
    Delete {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
        /// Skip the confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Totals across all tasks.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Tags in use, with task counts.
    Tags,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// all, active, completed, overdue, today or week.
    #[arg(long, short = 'f', default_value = "all")]
    pub filter: Category,

    /// Case-insensitive match on title, description and tags.
    #[arg(long, short = 's')]
    pub search: Option<String>,

    #[arg(long, short = 'p')]
    pub priority: Option<Priority>,

    #[arg(long, short = 't')]
    pub tag: Option<String>,

    /// Earliest due date, YYYY-MM-DD.
    #[arg(long)]
    pub from: Option<String>,

    /// Latest due date, YYYY-MM-DD.
    #[arg(long)]
    pub to: Option<String>,

    #[arg(long)]
    pub archived: bool,

    /// date_desc, date_asc, priority, title or created.
    #[arg(long)]
    pub sort: Option<SortKey>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub priority: Option<Priority>,

    /// YYYY-MM-DD or YYYY-MM-DDTHH:MM.
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,

    #[arg(long)]
    pub clear_due: bool,

    /// Replaces the tag list; repeat for several tags.
    #[arg(long = "tag", action = ArgAction::Append, conflicts_with = "clear_tags")]
    pub tags: Vec<String>,

    #[arg(long)]
    pub clear_tags: bool,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
