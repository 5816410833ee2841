use crate::agents::update::{StageContext, StageDispatcher, StageSelection, UpdateReport, plan};
use crate::agents::{
    BranchSyncAgent, BranchSyncOptions, PrivilegeAgent, SyncMode, SyncResult, ToolDetectorAgent,
    VersionControlAgent,
};
use crate::cli::{BranchSyncArgs, UpdateAllArgs};
use crate::config::Config;
use crate::error::Result;
use crate::process::SystemRunner;
use colored::Colorize;
use std::time::{Duration, Instant};

/// Pull the dotfiles and run every selected package manager
pub fn execute_update(config: &Config, args: &UpdateAllArgs) -> Result<()> {
    let started_at = jiff::Zoned::now().strftime("%Y-%m-%d %H:%M:%S").to_string();
    let clock = Instant::now();

    println!("{}", "Updating dotfiles and packages...".cyan().bold());
    println!("   Started at {}", started_at.dimmed());

    let runner = SystemRunner;
    let detector = ToolDetectorAgent::new(&runner, config);
    let privilege = PrivilegeAgent::new(&runner, config.sudo_prompt);
    let ctx = StageContext {
        runner: &runner,
        detector: &detector,
        privilege: &privilege,
        config,
    };

    let caps = detector.detect();
    let found: Vec<&str> = caps.iter().map(|tool| tool.name()).collect();
    if found.is_empty() {
        println!("   No supported tools found");
    } else {
        println!("   Detected: {}", found.join(", ").bright_cyan());
    }
    if privilege.is_root() {
        println!("   {}", "Running as root".dimmed());
    }

    let selection = StageSelection::from_requested(args.requested_stages(), !args.no_git_check);
    let plan = plan(&selection, &caps);

    let mut report = UpdateReport::new();
    StageDispatcher::new(&ctx).run(&plan, &mut report);

    print!("{}", render_update_report(&report, &started_at, clock.elapsed()));
    Ok(())
}

/// The end-of-run summary: updated stages, per-stage item lists, skips and
/// failures.
pub fn render_update_report(report: &UpdateReport, started_at: &str, elapsed: Duration) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", "Update summary".cyan().bold()));

    let updated = report.updated_stages();
    if updated.is_empty() {
        out.push_str(&format!("{}\n", "Nothing was updated".yellow()));
    } else {
        let names: Vec<&str> = updated.iter().map(|stage| stage.name()).collect();
        out.push_str(&format!("{} {}\n", "✓ Updated:".green(), names.join(", ")));
    }

    for stage in report.item_stages() {
        let items = report.unique_items(stage);
        out.push_str(&format!(
            "   {} {} ({}): {}\n",
            stage.name(),
            stage.item_label(),
            items.len(),
            items.join(", ").bright_cyan()
        ));
    }

    if !report.skipped().is_empty() {
        out.push_str(&format!("{}\n", "Skipped:".yellow()));
        for (stage, reason) in report.skipped() {
            out.push_str(&format!("   • {}: {}\n", stage.name(), reason.dimmed()));
        }
    }

    if !report.failures().is_empty() {
        out.push_str(&format!("{}\n", "Failed:".red()));
        for (stage, reason) in report.failures() {
            out.push_str(&format!("   • {}: {}\n", stage.name(), reason));
        }
    }

    let timing = format!(
        "Started {}, finished in {:.1}s",
        started_at,
        elapsed.as_secs_f64()
    );
    out.push_str(&format!("{}\n", timing.dimmed()));
    out
}

/// Merge or rebase the current repository onto its remote default branch
pub fn execute_branch_sync(config: &Config, mode: SyncMode, args: &BranchSyncArgs) -> Result<()> {
    let repo_path = std::env::current_dir()?;
    println!(
        "{}",
        format!("{} onto the remote default branch...", mode.verb())
            .cyan()
            .bold()
    );

    let runner = SystemRunner;
    let vcs = VersionControlAgent::new(&repo_path, &runner)?;
    let options = BranchSyncOptions {
        mode,
        dry_run: args.dry_run,
        branch: args.branch.clone(),
        remote: config.remote.clone(),
    };

    let result = BranchSyncAgent::new(vcs).sync(&options)?;
    println!("\n{}", describe_sync_result(&result, &options.remote).green().bold());
    Ok(())
}

fn describe_sync_result(result: &SyncResult, remote: &str) -> String {
    match result {
        SyncResult::UpToDate { target } => format!("✨ Already up to date with {remote}/{target}"),
        SyncResult::DryRun { target, incoming, .. } => format!(
            "✨ Dry run complete: {} commit(s) from {remote}/{target} pending",
            incoming.len()
        ),
        SyncResult::Merged { target, commits } => {
            format!("✨ Merged {commits} commit(s) from {remote}/{target}")
        }
        SyncResult::Rebased {
            target,
            commits,
            restored_stash,
        } => {
            let mut message = format!("✨ Rebased onto {remote}/{target} ({commits} new commit(s))");
            if *restored_stash {
                message.push_str(", local changes restored");
            }
            message
        }
    }
}
