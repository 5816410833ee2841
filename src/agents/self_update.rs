use crate::agents::tool_detector::Tool;
use crate::agents::update::context::{Stage, StageContext, StageOutcome};
use crate::agents::update::handlers::StageHandler;
use crate::agents::version_control::VersionControlAgent;
use crate::error::{DotupError, Result};
use crate::process::{CommandRunner, CommandSpec};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Where the dotfiles clone ended up after the pre-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfUpdateState {
    NotAGitRepo,
    FetchFailed(String),
    NoRemoteMainOrMaster,
    NotOnMainBranch { current: Option<String>, target: String },
    UpToDate,
    /// Behind the remote, but local changes block the pull.
    BehindDirty { behind: u32 },
    FastForwarded { behind: u32 },
    Rebased { ahead: u32, behind: u32 },
    PullFailed(String),
}

impl SelfUpdateState {
    pub fn pulled(&self) -> bool {
        matches!(
            self,
            SelfUpdateState::FastForwarded { .. } | SelfUpdateState::Rebased { .. }
        )
    }

    /// How the update report sees this state.
    pub fn outcome(&self) -> StageOutcome {
        match self {
            SelfUpdateState::UpToDate
            | SelfUpdateState::FastForwarded { .. }
            | SelfUpdateState::Rebased { .. } => StageOutcome::updated(),
            SelfUpdateState::NotAGitRepo => {
                StageOutcome::Skipped("dotfiles directory is not a git repository".to_string())
            }
            SelfUpdateState::FetchFailed(reason) => {
                StageOutcome::Skipped(format!("fetch failed: {reason}"))
            }
            SelfUpdateState::NoRemoteMainOrMaster => {
                StageOutcome::Skipped("no remote main or master branch".to_string())
            }
            SelfUpdateState::NotOnMainBranch { current, target } => StageOutcome::Skipped(format!(
                "on branch {} instead of {target}",
                current.as_deref().unwrap_or("(detached HEAD)")
            )),
            SelfUpdateState::BehindDirty { behind } => StageOutcome::Skipped(format!(
                "{behind} commit(s) behind but the working tree has local changes"
            )),
            SelfUpdateState::PullFailed(reason) => StageOutcome::Failed(reason.clone()),
        }
    }
}

/// SelfUpdateAgent keeps the dotfiles clone on its default branch current.
pub struct SelfUpdateAgent<'a> {
    runner: &'a dyn CommandRunner,
    dotfiles_dir: PathBuf,
    remote: String,
}

impl<'a> SelfUpdateAgent<'a> {
    pub fn new(runner: &'a dyn CommandRunner, dotfiles_dir: &Path, remote: &str) -> Self {
        Self {
            runner,
            dotfiles_dir: dotfiles_dir.to_path_buf(),
            remote: remote.to_string(),
        }
    }

    pub fn run(&self) -> SelfUpdateState {
        let vcs = match VersionControlAgent::new(&self.dotfiles_dir, self.runner) {
            Ok(vcs) if vcs.is_git_repo() => vcs,
            Ok(_) => return SelfUpdateState::NotAGitRepo,
            Err(e) => {
                tracing::debug!(error = %e, "dotfiles path rejected");
                return SelfUpdateState::NotAGitRepo;
            }
        };

        if let Err(e) = vcs.fetch_prune(&self.remote) {
            return SelfUpdateState::FetchFailed(e.to_string());
        }

        let target = match vcs.resolve_target_branch(&self.remote, None) {
            Ok(target) => target,
            Err(DotupError::NoDefaultBranch { .. }) => return SelfUpdateState::NoRemoteMainOrMaster,
            Err(e) => return SelfUpdateState::FetchFailed(e.to_string()),
        };

        match vcs.current_branch() {
            Ok(Some(current)) if current == target => {}
            Ok(current) => return SelfUpdateState::NotOnMainBranch { current, target },
            Err(e) => return SelfUpdateState::PullFailed(e.to_string()),
        }

        match self.sync(&vcs, &target) {
            Ok(state) => state,
            Err(e) => SelfUpdateState::PullFailed(e.to_string()),
        }
    }

    fn sync(&self, vcs: &VersionControlAgent<'_>, target: &str) -> Result<SelfUpdateState> {
        let upstream = format!("{}/{}", self.remote, target);
        let behind = vcs.count_commits(&format!("HEAD..{upstream}"))?;
        let ahead = vcs.count_commits(&format!("{upstream}..HEAD"))?;
        tracing::debug!(ahead, behind, upstream = %upstream, "dotfiles divergence");

        if behind == 0 {
            return Ok(SelfUpdateState::UpToDate);
        }
        if vcs.is_dirty()? {
            return Ok(SelfUpdateState::BehindDirty { behind });
        }

        let (output, state) = if ahead == 0 {
            (
                vcs.pull_fast_forward(&self.remote, target)?,
                SelfUpdateState::FastForwarded { behind },
            )
        } else {
            (
                vcs.pull_rebase(&self.remote, target)?,
                SelfUpdateState::Rebased { ahead, behind },
            )
        };

        if output.success() {
            Ok(state)
        } else {
            Ok(SelfUpdateState::PullFailed(format!(
                "git pull exited with code {}",
                output.code.unwrap_or(-1)
            )))
        }
    }

    /// A child process cannot reload its parent's shell. Check that the new
    /// configuration still loads and tell the user how to pick it up.
    pub fn reload_shell(&self) {
        let Ok(shell) = std::env::var("SHELL") else {
            return;
        };
        let spec = CommandSpec::new(&shell).args(["-ic", "exit"]);
        match self.runner.capture(&spec) {
            Ok(output) if output.success() => {}
            Ok(output) => tracing::debug!(code = ?output.code, "interactive shell exited non-zero"),
            Err(e) => tracing::debug!(error = %e, "could not start interactive shell"),
        }
        println!(
            "   Run {} to load the updated configuration",
            format!("exec {shell} -l").bright_cyan()
        );
    }

    fn print(&self, state: &SelfUpdateState) {
        let dir = self.dotfiles_dir.display();
        match state {
            SelfUpdateState::UpToDate => println!("   {} Dotfiles are up to date", "✓".green()),
            SelfUpdateState::FastForwarded { behind } => println!(
                "   {} Fast-forwarded {} commit(s)",
                "✓".green(),
                behind
            ),
            SelfUpdateState::Rebased { ahead, behind } => println!(
                "   {} Rebased {} local commit(s) onto {} new commit(s)",
                "✓".green(),
                ahead,
                behind
            ),
            SelfUpdateState::NotAGitRepo => println!(
                "   {}",
                format!("⚠ {dir} is not a git repository, skipping").yellow()
            ),
            SelfUpdateState::FetchFailed(reason) => println!(
                "   {}",
                format!("⚠ Could not fetch {}: {reason}", self.remote).yellow()
            ),
            SelfUpdateState::NoRemoteMainOrMaster => println!(
                "   {}",
                format!("⚠ Could not find {0}/main or {0}/master, skipping", self.remote).yellow()
            ),
            SelfUpdateState::NotOnMainBranch { current, target } => println!(
                "   On branch {}, not {}; skipping dotfiles update",
                current.as_deref().unwrap_or("(detached HEAD)"),
                target
            ),
            SelfUpdateState::BehindDirty { behind } => {
                println!(
                    "   {}",
                    format!("⚠ {behind} new commit(s) upstream, but {dir} has local changes").yellow()
                );
                println!("   Commit or stash them, then run:");
                println!("     {}", format!("git -C {dir} pull --rebase").bright_cyan());
            }
            SelfUpdateState::PullFailed(reason) => {
                println!("   {}", format!("⚠ Dotfiles pull failed: {reason}").red());
                println!("   Resolve it manually:");
                println!("     {}", format!("git -C {dir} status").bright_cyan());
                println!("     {}", format!("git -C {dir} rebase --abort").bright_cyan());
            }
        }
    }
}

/// First stage of `update-all`. Never fatal for the run.
pub struct SelfUpdateHandler;

impl StageHandler for SelfUpdateHandler {
    fn stage(&self) -> Stage {
        Stage::GitSelfUpdate
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutcome> {
        if !ctx.detector.is_present(Tool::Git) {
            return Err(DotupError::ToolAbsent("git".to_string()));
        }

        let agent = SelfUpdateAgent::new(ctx.runner, &ctx.config.dotfiles_dir, &ctx.config.remote);
        let state = agent.run();
        agent.print(&state);
        if state.pulled() {
            agent.reload_shell();
        }
        Ok(state.outcome())
    }
}
