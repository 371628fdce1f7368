use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ghpulse",
    about = "Print lines of code and commit cadence for a GitHub repository",
    long_about = "Print lines of code and commit cadence for a GitHub repository.\n\n\
                  Reads GITHUB_TOKEN and GITHUB_REPO (owner/name) from the environment \
                  or from a .env file in the working directory.",
    version
)]
pub struct Cli {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Include per-developer metrics
    #[arg(short, long, conflicts_with = "json")]
    pub authors: bool,

    /// Also count files changed and lines added/removed per developer
    /// (one extra API request per commit)
    #[arg(long)]
    pub changes: bool,

    /// Disable colored output (overrides TTY auto-detection)
    #[arg(long)]
    pub no_color: bool,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
