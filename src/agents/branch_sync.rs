use crate::agents::version_control::VersionControlAgent;
use crate::error::{DotupError, Result};
use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Merge,
    Rebase,
}

impl SyncMode {
    pub fn verb(&self) -> &'static str {
        match self {
            SyncMode::Merge => "Merge",
            SyncMode::Rebase => "Rebase",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BranchSyncOptions {
    pub mode: SyncMode,
    pub dry_run: bool,
    /// Explicit target branch; `main` then `master` when absent.
    pub branch: Option<String>,
    pub remote: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    UpToDate { target: String },
    DryRun { target: String, incoming: Vec<String>, local: Vec<String> },
    Merged { target: String, commits: u32 },
    Rebased { target: String, commits: u32, restored_stash: bool },
}

/// BranchSyncAgent brings the current branch up to date with the remote
/// default branch by merge or rebase.
pub struct BranchSyncAgent<'a> {
    vcs: VersionControlAgent<'a>,
}

impl<'a> BranchSyncAgent<'a> {
    pub fn new(vcs: VersionControlAgent<'a>) -> Self {
        Self { vcs }
    }

    pub fn sync(&self, options: &BranchSyncOptions) -> Result<SyncResult> {
        println!("\n{}", "1. Checking repository state...".yellow());
        if !self.vcs.is_git_repo() {
            return Err(DotupError::GitOperation(format!(
                "{} is not a git repository",
                self.vcs.repo_path().display()
            )));
        }
        let current = self.vcs.current_branch()?.ok_or(DotupError::DetachedHead)?;
        let target = self
            .vcs
            .resolve_target_branch(&options.remote, options.branch.as_deref())?;
        if current == target {
            return Err(DotupError::SelfTarget(current));
        }
        println!("   {} {} <- {}/{}", "✓".green(), current.bright_cyan(), options.remote, target);

        println!("\n{}", format!("2. Fetching {}...", options.remote).yellow());
        self.vcs.fetch_prune(&options.remote)?;
        if !self.vcs.remote_branch_exists(&options.remote, &target)? {
            return Err(DotupError::BranchNotFound {
                remote: options.remote.clone(),
                branch: target,
            });
        }

        let upstream = format!("{}/{}", options.remote, target);
        let incoming_range = format!("HEAD..{upstream}");
        let behind = self.vcs.count_commits(&incoming_range)?;
        if behind == 0 {
            println!("   {} {} is already up to date with {}", "✓".green(), current, upstream);
            return Ok(SyncResult::UpToDate { target });
        }
        println!("   {} new commit(s) on {}", behind, upstream.bright_cyan());

        if options.dry_run {
            let incoming = self.vcs.log_range(&incoming_range)?;
            let local = self.vcs.log_range(&format!("{upstream}..HEAD"))?;
            print_dry_run(options.mode, &current, &upstream, &incoming, &local);
            return Ok(SyncResult::DryRun {
                target,
                incoming,
                local,
            });
        }

        println!("\n{}", format!("3. {} onto {}...", options.mode.verb(), upstream).yellow());
        match options.mode {
            SyncMode::Merge => self.merge(&upstream, target, behind),
            SyncMode::Rebase => self.rebase(&upstream, target, behind),
        }
    }

    fn merge(&self, upstream: &str, target: String, behind: u32) -> Result<SyncResult> {
        if self.vcs.is_dirty()? {
            return Err(DotupError::DirtyWorkingTree);
        }

        let output = self.vcs.merge(upstream)?;
        if !output.success() {
            return Err(DotupError::Conflict {
                operation: "Merge".to_string(),
                remediation: vec![
                    "git status".to_string(),
                    "# fix the conflicting files, then:".to_string(),
                    "git add <files> && git commit --no-edit".to_string(),
                    "# or give up with:".to_string(),
                    "git merge --abort".to_string(),
                ],
            });
        }

        Ok(SyncResult::Merged {
            target,
            commits: behind,
        })
    }

    fn rebase(&self, upstream: &str, target: String, behind: u32) -> Result<SyncResult> {
        let stash = if self.vcs.is_dirty()? {
            let message = autostash_message(upstream);
            self.vcs.stash_push(&message)?;
            println!("   Stashed local changes as '{}'", message.bright_cyan());
            Some(message)
        } else {
            None
        };

        let output = self.vcs.rebase(upstream)?;
        if !output.success() {
            let mut remediation = vec![
                "git status".to_string(),
                "# fix the conflicting files, then:".to_string(),
                "git add <files> && git rebase --continue".to_string(),
                "# or give up with:".to_string(),
                "git rebase --abort".to_string(),
            ];
            if let Some(message) = &stash {
                remediation.push(format!("# afterwards restore '{message}' with:"));
                remediation.push("git stash pop".to_string());
            }
            return Err(DotupError::Conflict {
                operation: "Rebase".to_string(),
                remediation,
            });
        }

        let restored_stash = match stash {
            Some(message) => {
                if !self.vcs.stash_pop()?.success() {
                    return Err(DotupError::StashRestore { stash: message });
                }
                println!("   {} Restored stashed changes", "✓".green());
                true
            }
            None => false,
        };

        Ok(SyncResult::Rebased {
            target,
            commits: behind,
            restored_stash,
        })
    }
}

/// Stash message that identifies entries created by this tool.
pub fn autostash_message(upstream: &str) -> String {
    let now = jiff::Zoned::now();
    format!(
        "dotup autostash {} (rebase onto {upstream})",
        now.strftime("%Y-%m-%d %H:%M:%S")
    )
}

fn print_dry_run(mode: SyncMode, current: &str, upstream: &str, incoming: &[String], local: &[String]) {
    println!(
        "\n{}",
        format!("Dry run: {} {} into {}", mode.verb().to_lowercase(), upstream, current).cyan().bold()
    );
    println!("   Incoming commits ({}):", incoming.len());
    for line in incoming {
        println!("   • {}", line);
    }
    if mode == SyncMode::Rebase && !local.is_empty() {
        println!("   Local commits to replay ({}):", local.len());
        for line in local {
            println!("   • {}", line);
        }
    }
    println!("   {}", "Nothing was changed.".dimmed());
}
