use crate::error::{DotupError, Result};
use crate::process::{CommandOutput, CommandRunner, CommandSpec};
use crate::utils::PathValidator;
use std::path::{Path, PathBuf};

/// Branch names tried, in order, when no target branch is given.
pub const DEFAULT_BRANCH_CANDIDATES: [&str; 2] = ["main", "master"];

/// VersionControlAgent runs git against one explicit repository path.
///
/// Every command carries the repository as its working directory; the
/// process-wide current directory is never changed.
pub struct VersionControlAgent<'a> {
    repo_path: PathBuf,
    runner: &'a dyn CommandRunner,
}

impl<'a> VersionControlAgent<'a> {
    pub fn new<P: AsRef<Path>>(repo_path: P, runner: &'a dyn CommandRunner) -> Result<Self> {
        let repo_path = PathValidator::validate_repo_path(repo_path)?;
        Ok(Self { repo_path, runner })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// True when the path is inside a git work tree.
    pub fn is_git_repo(&self) -> bool {
        match self.run_git(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(output) => output.success() && output.stdout_trimmed() == "true",
            Err(_) => false,
        }
    }

    /// Current branch name, or `None` on a detached HEAD.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let output = self.run_git(&["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        if !output.success() {
            return Ok(None);
        }
        let name = output.stdout_trimmed();
        Ok((!name.is_empty()).then(|| name.to_string()))
    }

    pub fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool> {
        let reference = format!("refs/remotes/{remote}/{branch}");
        let output = self.run_git(&["rev-parse", "--verify", "--quiet", &reference])?;
        Ok(output.success())
    }

    /// Use `explicit` when given, otherwise the first of `main`/`master` that
    /// exists on `remote`.
    pub fn resolve_target_branch(&self, remote: &str, explicit: Option<&str>) -> Result<String> {
        if let Some(branch) = explicit {
            return Ok(branch.to_string());
        }

        for candidate in DEFAULT_BRANCH_CANDIDATES {
            if self.remote_branch_exists(remote, candidate)? {
                return Ok(candidate.to_string());
            }
        }

        Err(DotupError::NoDefaultBranch {
            remote: remote.to_string(),
        })
    }

    /// Never prompts for credentials; an unreachable remote fails instead.
    pub fn fetch_prune(&self, remote: &str) -> Result<()> {
        let spec = self
            .git(&["fetch", "--prune", remote])
            .env("GIT_TERMINAL_PROMPT", "0");
        let output = self.runner.capture(&spec).map_err(|e| {
            DotupError::GitOperation(format!("Failed to execute git command 'fetch': {e}"))
        })?;
        Self::ensure_success(&output, "git fetch")
    }

    /// Number of commits in `range` (e.g. `HEAD..origin/main`).
    pub fn count_commits(&self, range: &str) -> Result<u32> {
        let output = self.run_git(&["rev-list", "--count", range])?;
        Self::ensure_success(&output, "git rev-list")?;
        output.stdout_trimmed().parse::<u32>().map_err(|e| {
            DotupError::GitOperation(format!(
                "Unexpected rev-list output '{}': {e}",
                output.stdout_trimmed()
            ))
        })
    }

    /// One-line summaries of the commits in `range`.
    pub fn log_range(&self, range: &str) -> Result<Vec<String>> {
        let output = self.run_git(&["log", "--oneline", "--no-decorate", range])?;
        Self::ensure_success(&output, "git log")?;
        Ok(output
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Modified tracked files or any untracked file.
    pub fn is_dirty(&self) -> Result<bool> {
        let output = self.run_git(&["status", "--porcelain", "--untracked-files=normal"])?;
        Self::ensure_success(&output, "git status")?;
        Ok(!output.stdout_trimmed().is_empty())
    }

    pub fn merge(&self, upstream: &str) -> Result<CommandOutput> {
        self.stream_git(&["merge", "--no-edit", upstream])
    }

    pub fn rebase(&self, upstream: &str) -> Result<CommandOutput> {
        self.stream_git(&["rebase", upstream])
    }

    pub fn pull_fast_forward(&self, remote: &str, branch: &str) -> Result<CommandOutput> {
        self.stream_git(&["pull", "--ff-only", remote, branch])
    }

    pub fn pull_rebase(&self, remote: &str, branch: &str) -> Result<CommandOutput> {
        self.stream_git(&["pull", "--rebase", remote, branch])
    }

    /// Stash tracked and untracked changes under `message`.
    pub fn stash_push(&self, message: &str) -> Result<()> {
        let output = self.run_git(&["stash", "push", "--include-untracked", "-m", message])?;
        Self::ensure_success(&output, "git stash push")
    }

    pub fn stash_pop(&self) -> Result<CommandOutput> {
        self.stream_git(&["stash", "pop"])
    }

    fn git(&self, args: &[&str]) -> CommandSpec {
        CommandSpec::new("git")
            .args(args.iter().copied())
            .current_dir(&self.repo_path)
    }

    fn run_git(&self, args: &[&str]) -> Result<CommandOutput> {
        self.runner.capture(&self.git(args)).map_err(|e| {
            DotupError::GitOperation(format!(
                "Failed to execute git command '{}': {e}",
                args.join(" ")
            ))
        })
    }

    fn stream_git(&self, args: &[&str]) -> Result<CommandOutput> {
        self.runner.stream(&self.git(args)).map_err(|e| {
            DotupError::GitOperation(format!(
                "Failed to execute git command '{}': {e}",
                args.join(" ")
            ))
        })
    }

    fn ensure_success(output: &CommandOutput, command: &str) -> Result<()> {
        if output.success() {
            return Ok(());
        }

        Err(DotupError::GitOperation(format!(
            "{} failed: {}",
            command,
            output.stderr.trim()
        )))
    }
}
