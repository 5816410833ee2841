// Handler modules, one per package manager.
//
// Every handler follows the same template: check its precondition, capture
// the outdated items, then run its sub-steps in a fixed order
// (sync -> upgrade -> secondary -> orphans -> cache).

pub mod apt_handler;
pub mod brew_handler;
pub mod npm_handler;
pub mod pacman_handler;
pub mod yay_handler;
pub mod zinit_handler;

pub use apt_handler::AptHandler;
pub use brew_handler::BrewHandler;
pub use npm_handler::NpmHandler;
pub use pacman_handler::PacmanHandler;
pub use yay_handler::YayHandler;
pub use zinit_handler::ZinitHandler;

use super::context::{Stage, StageContext, StageOutcome};
use crate::agents::self_update::SelfUpdateHandler;
use crate::error::{DotupError, Result};
use crate::process::{CommandOutput, CommandSpec};
use crate::utils::progress::spinner;
use colored::Colorize;
use regex::Regex;

/// One update routine.
pub trait StageHandler {
    fn stage(&self) -> Stage;

    /// Run the stage. Precondition failures come back as
    /// [`DotupError::ToolAbsent`] / [`DotupError::PermissionDenied`] before
    /// anything is changed on the host.
    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutcome>;
}

pub fn handler_for(stage: Stage) -> Box<dyn StageHandler> {
    match stage {
        Stage::GitSelfUpdate => Box::new(SelfUpdateHandler),
        Stage::Zinit => Box::new(ZinitHandler),
        Stage::Homebrew => Box::new(BrewHandler),
        Stage::Apt => Box::new(AptHandler),
        Stage::Pacman => Box::new(PacmanHandler),
        Stage::Yay => Box::new(YayHandler),
        Stage::Npm => Box::new(NpmHandler),
    }
}

/// Position of a sub-step inside a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Refresh package metadata. Failure is a warning.
    Sync,
    /// The core upgrade. Failure ends the stage.
    Upgrade,
    /// Upgrade of a secondary category (casks, AUR). Failure is a warning.
    Secondary,
    /// Orphan removal. Failure is a warning.
    Orphans,
    /// Cache cleanup. Failure is a warning.
    Cache,
}

impl StepKind {
    fn label(&self) -> &'static str {
        match self {
            StepKind::Sync => "sync",
            StepKind::Upgrade => "upgrade",
            StepKind::Secondary => "secondary upgrade",
            StepKind::Orphans => "orphan removal",
            StepKind::Cache => "cache cleanup",
        }
    }
}

/// Runs a stage's sub-steps and remembers whether any of them succeeded.
pub(crate) struct StepRunner<'c, 'a> {
    ctx: &'c StageContext<'a>,
    succeeded: usize,
}

impl<'c, 'a> StepRunner<'c, 'a> {
    pub(crate) fn new(ctx: &'c StageContext<'a>) -> Self {
        Self { ctx, succeeded: 0 }
    }

    /// Run one sub-step. Only [`StepKind::Upgrade`] turns a failure into an
    /// error; every other kind prints a warning and returns `Ok(false)`.
    pub(crate) fn run(&mut self, kind: StepKind, spec: CommandSpec) -> Result<bool> {
        let result = self
            .ctx
            .runner
            .stream(&spec)
            .and_then(|output| output.ensure_success(&spec));

        match result {
            Ok(_) => {
                self.succeeded += 1;
                Ok(true)
            }
            Err(e) if kind == StepKind::Upgrade => Err(e),
            Err(e) => {
                tracing::warn!(step = kind.label(), error = %e, "sub-step failed");
                println!(
                    "   {}",
                    format!("⚠ {} failed, continuing: {}", kind.label(), e).yellow()
                );
                Ok(false)
            }
        }
    }

    pub(crate) fn any_succeeded(&self) -> bool {
        self.succeeded > 0
    }

    /// Updated with `items` if anything worked, otherwise Failed.
    pub(crate) fn finish(self, items: Vec<String>) -> StageOutcome {
        if self.any_succeeded() {
            StageOutcome::Updated { items }
        } else {
            StageOutcome::Failed("no update step succeeded".to_string())
        }
    }
}

/// Run a read-only query behind a spinner. Spawn failures and non-zero exits
/// both come back as `None` so "before" snapshots stay best-effort.
pub(crate) fn query(ctx: &StageContext<'_>, spec: &CommandSpec, message: &str) -> Option<CommandOutput> {
    let pb = spinner(message.to_string());
    let result = ctx.runner.capture(spec);
    pb.finish_and_clear();

    match result {
        Ok(output) if output.success() => Some(output),
        Ok(output) => {
            tracing::debug!(command = %spec.display(), code = ?output.code, "query exited non-zero");
            None
        }
        Err(e) => {
            tracing::debug!(command = %spec.display(), error = %e, "query failed");
            None
        }
    }
}

/// Package names from `name old -> new` lines, as printed by `pacman -Qu`,
/// `checkupdates` and `yay -Qu`.
pub fn parse_arrow_updates(output: &str) -> Result<Vec<String>> {
    let line_regex = Regex::new(r"^\s*(\S+)\s+\S+\s+->\s+\S+")
        .map_err(|e| DotupError::Parse(format!("Regex error: {}", e)))?;

    Ok(output
        .lines()
        .filter_map(|line| line_regex.captures(line))
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect())
}

/// Print the outdated list a stage is about to upgrade.
pub(crate) fn print_pending(items: &[String]) {
    if items.is_empty() {
        println!("   {}", "No outdated packages reported".dimmed());
    } else {
        println!("   {} outdated: {}", items.len(), items.join(", ").bright_cyan());
    }
}
