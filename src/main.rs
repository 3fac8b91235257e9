//! # git-backup
//!
//! **git-backup** backs up and archives git repositories.
//!
//! Features:
//! - Keep persistent mirrors of the repositories listed in `config.toml`
//! - `git-backup run` performs one backup and archive pass
//! - `git-backup list` shows the configured repositories
//! - `git-backup init` prints an example configuration
//! - `git-backup home` prints the configuration directory
//!
//! This CLI is built with [clap](https://docs.rs/clap).

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use git_backup::{cmd_init, cmd_list, cmd_run, config_home, init_logging};
use std::path::PathBuf;

/// Command-line interface definition.
#[derive(Parser, Debug)]
#[command(
    name = "git-backup",
    version,
    about = "Backup and archive git repositories",
    arg_required_else_help = true
)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/git-backup/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run a one-time backup and archive
    Run {
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// List configured repositories
    List,
    /// Print an example config.toml
    Init,
    /// Show the configuration directory
    Home,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.cmd {
        Cmd::Run { json } => cmd_run(cli.config.as_deref(), json),
        Cmd::List => cmd_list(cli.config.as_deref()),
        Cmd::Init => cmd_init(),
        Cmd::Home => {
            println!("{}", config_home().display());
            Ok(())
        }
    }
}
