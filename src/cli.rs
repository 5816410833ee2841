use crate::agents::update::Stage;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dotup",
    about = "Keep dotfiles and system packages up to date",
    version,
    author
)]
pub struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/dotup/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull the dotfiles repository, then update every detected package manager
    #[command(disable_help_flag = true)]
    UpdateAll(UpdateAllArgs),

    /// Merge the remote main/master branch into the current branch
    MergeMain(BranchSyncArgs),

    /// Rebase the current branch onto the remote main/master branch
    RebaseMain(BranchSyncArgs),
}

/// Passing any package-manager flag runs only the named managers.
#[derive(Args, Debug)]
pub struct UpdateAllArgs {
    /// Update APT packages
    #[arg(short = 'a', long)]
    pub apt: bool,

    /// Update Pacman packages
    #[arg(short = 'p', long)]
    pub pacman: bool,

    /// Update Yay (repo and AUR) packages
    #[arg(short = 'y', long)]
    pub yay: bool,

    /// Update global npm packages for every node version
    #[arg(short = 'n', long)]
    pub npm: bool,

    /// Update Homebrew formulae and casks
    #[arg(short = 'h', long)]
    pub brew: bool,

    /// Update Zinit and its plugins
    #[arg(short = 'z', long)]
    pub zinit: bool,

    /// Skip the dotfiles self-update check
    #[arg(long)]
    pub no_git_check: bool,

    /// Print help (-h selects Homebrew)
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

impl UpdateAllArgs {
    /// Package-manager stages named on the command line, in run order.
    pub fn requested_stages(&self) -> Vec<Stage> {
        [
            (self.zinit, Stage::Zinit),
            (self.brew, Stage::Homebrew),
            (self.apt, Stage::Apt),
            (self.pacman, Stage::Pacman),
            (self.yay, Stage::Yay),
            (self.npm, Stage::Npm),
        ]
        .into_iter()
        .filter(|(flag, _)| *flag)
        .map(|(_, stage)| stage)
        .collect()
    }
}

#[derive(Args, Debug)]
pub struct BranchSyncArgs {
    /// Show the commits that would be applied without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Target branch (defaults to main, then master)
    #[arg(long, value_name = "NAME")]
    pub branch: Option<String>,
}
