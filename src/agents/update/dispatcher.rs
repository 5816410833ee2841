use super::context::{Stage, StageContext, StageOutcome, UpdateReport};
use super::handlers::handler_for;
use super::selection::StageSelection;
use crate::agents::tool_detector::{Capabilities, Tool};
use colored::Colorize;

pub const NOT_REQUESTED: &str = "not requested by user";
pub const GIT_CHECK_DISABLED: &str = "disabled with --no-git-check";
pub const HANDLED_BY_YAY: &str = "handled by yay";

/// What the plan says about one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Run,
    Skip(String),
}

/// Tool whose presence gates `stage`.
pub fn gating_tool(stage: Stage) -> Tool {
    match stage {
        Stage::GitSelfUpdate => Tool::Git,
        Stage::Zinit => Tool::Zinit,
        Stage::Homebrew => Tool::Brew,
        Stage::Apt => Tool::AptGet,
        Stage::Pacman => Tool::Pacman,
        Stage::Yay => Tool::Yay,
        Stage::Npm => Tool::Npm,
    }
}

fn is_available(stage: Stage, caps: &Capabilities) -> bool {
    match stage {
        Stage::Npm => caps.has(Tool::Npm) || caps.has(Tool::Nvm),
        other => caps.has(gating_tool(other)),
    }
}

/// Decide, in run order, which stages execute and why the others do not.
///
/// Yay upgrades repo packages too, so when it is present and requested the
/// Pacman stage is skipped whatever its own flag says.
pub fn plan(selection: &StageSelection, caps: &Capabilities) -> Vec<(Stage, Decision)> {
    let yay_active = selection.is_requested(Stage::Yay) && caps.has(Tool::Yay);

    Stage::ORDER
        .into_iter()
        .map(|stage| {
            let decision = if stage == Stage::Pacman && yay_active {
                Decision::Skip(HANDLED_BY_YAY.to_string())
            } else if !selection.is_requested(stage) {
                let reason = if stage == Stage::GitSelfUpdate {
                    GIT_CHECK_DISABLED
                } else {
                    NOT_REQUESTED
                };
                Decision::Skip(reason.to_string())
            } else if !is_available(stage, caps) {
                Decision::Skip(format!("{} is not installed", gating_tool(stage)))
            } else {
                Decision::Run
            };
            (stage, decision)
        })
        .collect()
}

/// Runs a plan stage by stage and records every outcome in the report.
///
/// Stage errors never escape: precondition failures become Skipped, anything
/// else becomes Failed, and the next stage runs.
pub struct StageDispatcher<'c, 'a> {
    ctx: &'c StageContext<'a>,
}

impl<'c, 'a> StageDispatcher<'c, 'a> {
    pub fn new(ctx: &'c StageContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn run(&self, plan: &[(Stage, Decision)], report: &mut UpdateReport) {
        let mut step = 0;
        for (stage, decision) in plan {
            match decision {
                Decision::Skip(reason) => {
                    tracing::debug!(stage = %stage, reason = %reason, "stage skipped by plan");
                    report.skip(*stage, reason.clone());
                }
                Decision::Run => {
                    step += 1;
                    println!("\n{}", format!("{}. Updating {}...", step, stage).yellow());
                    let outcome = self.execute(*stage);
                    print_outcome(*stage, &outcome);
                    report.record(*stage, outcome);
                }
            }
        }
    }

    fn execute(&self, stage: Stage) -> StageOutcome {
        let handler = handler_for(stage);
        tracing::debug!(stage = %handler.stage(), "running stage");
        match handler.execute(self.ctx) {
            Ok(outcome) => outcome,
            Err(e) if e.is_precondition() => {
                tracing::info!(stage = %stage, error = %e, "stage precondition not met");
                StageOutcome::Skipped(e.to_string())
            }
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "stage failed");
                for line in e.remediation() {
                    println!("     {}", line.bright_cyan());
                }
                StageOutcome::Failed(e.to_string())
            }
        }
    }
}

fn print_outcome(stage: Stage, outcome: &StageOutcome) {
    match outcome {
        StageOutcome::Updated { .. } => println!("{}", format!("✓ {} done", stage).green()),
        StageOutcome::Skipped(reason) => {
            println!("{}", format!("⚠ {} skipped: {}", stage, reason).yellow())
        }
        StageOutcome::Failed(reason) => {
            println!("{}", format!("✗ {} failed: {}", stage, reason).red())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::update::context::StageStatus;
    use crate::agents::update::handlers::test_support::{config_in, stage_ctx};
    use crate::process::CommandOutput;
    use crate::process::testing::ScriptedRunner;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const GATING: [Tool; 7] = [
        Tool::Git,
        Tool::Zinit,
        Tool::Brew,
        Tool::AptGet,
        Tool::Pacman,
        Tool::Yay,
        Tool::Npm,
    ];

    fn caps_from_mask(mask: u32) -> Capabilities {
        Capabilities::from_tools(
            GATING
                .into_iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, tool)| tool),
        )
    }

    fn decision(plan: &[(Stage, Decision)], stage: Stage) -> &Decision {
        &plan.iter().find(|(s, _)| *s == stage).unwrap().1
    }

    #[test]
    fn default_selection_runs_exactly_the_present_tools() {
        for mask in 0..(1u32 << GATING.len()) {
            let caps = caps_from_mask(mask);
            let plan = plan(&StageSelection::all(), &caps);
            assert_eq!(plan.len(), Stage::ORDER.len());

            for (stage, decision) in &plan {
                let present = caps.has(gating_tool(*stage));
                let excluded = *stage == Stage::Pacman && caps.has(Tool::Yay);
                match decision {
                    Decision::Run => assert!(present && !excluded, "{stage} ran with caps {mask:b}"),
                    Decision::Skip(reason) => {
                        assert!(!present || excluded, "{stage} skipped with caps {mask:b}");
                        assert!(!reason.is_empty());
                    }
                }
            }
        }
    }

    #[test]
    fn yay_always_displaces_pacman() {
        let caps = Capabilities::from_tools([Tool::Pacman, Tool::Yay]);
        let selections = [
            StageSelection::all(),
            StageSelection::from_requested([Stage::Pacman, Stage::Yay], true),
        ];
        for selection in &selections {
            let plan = plan(selection, &caps);
            assert_eq!(
                decision(&plan, Stage::Pacman),
                &Decision::Skip(HANDLED_BY_YAY.to_string())
            );
            assert_eq!(decision(&plan, Stage::Yay), &Decision::Run);
        }
    }

    #[test]
    fn pacman_runs_when_yay_is_not_requested() {
        let caps = Capabilities::from_tools([Tool::Pacman, Tool::Yay]);
        let plan = plan(&StageSelection::from_requested([Stage::Pacman], true), &caps);
        assert_eq!(decision(&plan, Stage::Pacman), &Decision::Run);
        assert_eq!(
            decision(&plan, Stage::Yay),
            &Decision::Skip(NOT_REQUESTED.to_string())
        );
    }

    #[test]
    fn nvm_alone_enables_the_npm_stage() {
        let caps = Capabilities::from_tools([Tool::Nvm]);
        let plan = plan(&StageSelection::all(), &caps);
        assert_eq!(decision(&plan, Stage::Npm), &Decision::Run);
    }

    #[test]
    fn no_git_check_skips_the_dotfiles_stage() {
        let caps = Capabilities::from_tools([Tool::Git]);
        let plan = plan(&StageSelection::from_requested(Vec::new(), false), &caps);
        assert_eq!(
            decision(&plan, Stage::GitSelfUpdate),
            &Decision::Skip(GIT_CHECK_DISABLED.to_string())
        );
    }

    #[test]
    fn npm_flag_runs_only_npm() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = ScriptedRunner::new()
            .with_tools(&["npm", "brew", "apt-get", "pacman", "yay"])
            .respond("npm outdated", CommandOutput::ok("{}"));
        stage_ctx!(ctx, &runner, &config, root = false);

        let caps = ctx.detector.detect();
        let selection = StageSelection::from_requested([Stage::Npm], true);
        let mut report = UpdateReport::new();
        StageDispatcher::new(&ctx).run(&plan(&selection, &caps), &mut report);

        assert_eq!(report.status(Stage::Npm), Some(StageStatus::Updated));
        for stage in [Stage::Zinit, Stage::Homebrew, Stage::Apt, Stage::Pacman, Stage::Yay] {
            assert_eq!(report.status(stage), Some(StageStatus::Skipped));
            assert_eq!(report.skip_reason(stage), Some(NOT_REQUESTED));
        }
        assert!(runner.calls().iter().all(|c| c.starts_with("npm ")));
    }

    #[test]
    fn handler_preconditions_become_skips_and_errors_become_failures() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = ScriptedRunner::new()
            .with_tools(&["brew", "apt-get"])
            .respond("apt-get upgrade", CommandOutput::failed(100, "dpkg was interrupted"));
        stage_ctx!(ctx, &runner, &config, root = true);

        let caps = ctx.detector.detect();
        let mut report = UpdateReport::new();
        StageDispatcher::new(&ctx).run(&plan(&StageSelection::all(), &caps), &mut report);

        assert_eq!(report.status(Stage::Homebrew), Some(StageStatus::Skipped));
        assert!(report.skip_reason(Stage::Homebrew).unwrap().contains("root"));
        assert_eq!(report.status(Stage::Apt), Some(StageStatus::Failed));
        assert!(report.failures()[0].1.contains("dpkg was interrupted"));
        assert_eq!(report.status(Stage::Npm), Some(StageStatus::Skipped));
    }
}
