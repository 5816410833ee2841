use super::{StageHandler, StepKind, StepRunner, parse_arrow_updates, print_pending, query};
use crate::agents::tool_detector::Tool;
use crate::agents::update::context::{Stage, StageContext, StageOutcome};
use crate::error::{DotupError, Result};
use crate::process::CommandSpec;

/// Pacman: `-Sy` -> `-Su` -> remove orphans -> `-Sc`.
///
/// Only used when yay is not handling the system; see the dispatcher.
pub struct PacmanHandler;

impl PacmanHandler {
    /// Outdated packages, preferring `checkupdates` (uses a private database
    /// copy) over `pacman -Qu`.
    fn pending(ctx: &StageContext<'_>) -> Result<Vec<String>> {
        let message = "Checking for package updates...";
        let output = if ctx.runner.is_available("checkupdates") {
            query(ctx, &CommandSpec::new("checkupdates"), message)
        } else {
            None
        };
        let output = match output {
            Some(output) => Some(output),
            None => query(ctx, &CommandSpec::new("pacman").arg("-Qu"), message),
        };

        match output {
            Some(output) => parse_arrow_updates(&output.stdout),
            None => Ok(Vec::new()),
        }
    }

    fn orphans(ctx: &StageContext<'_>) -> Vec<String> {
        query(
            ctx,
            &CommandSpec::new("pacman").arg("-Qdtq"),
            "Looking for orphaned packages...",
        )
        .map(|output| {
            output
                .stdout
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
    }
}

impl StageHandler for PacmanHandler {
    fn stage(&self) -> Stage {
        Stage::Pacman
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutcome> {
        if !ctx.detector.is_present(Tool::Pacman) {
            return Err(DotupError::ToolAbsent("pacman".to_string()));
        }
        let elevation = ctx.privilege.acquire()?;
        let pacman = |args: &[&str]| elevation.apply(CommandSpec::new("pacman").args(args.iter().copied()));

        let before = Self::pending(ctx)?;
        print_pending(&before);

        let mut steps = StepRunner::new(ctx);
        steps.run(StepKind::Sync, pacman(&["-Sy"]))?;
        steps.run(StepKind::Upgrade, pacman(&["-Su", "--noconfirm"]))?;

        let orphans = Self::orphans(ctx);
        if orphans.is_empty() {
            tracing::debug!("no orphaned packages");
        } else {
            let remove = pacman(&["-Rns", "--noconfirm"]).args(orphans);
            steps.run(StepKind::Orphans, remove)?;
        }

        steps.run(StepKind::Cache, pacman(&["-Sc", "--noconfirm"]))?;

        Ok(steps.finish(before))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::update::handlers::test_support::{config_in, stage_ctx};
    use crate::process::CommandOutput;
    use crate::process::testing::ScriptedRunner;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn prefers_checkupdates_and_removes_orphans() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = ScriptedRunner::new()
            .with_tools(&["pacman", "checkupdates"])
            .respond(
                "checkupdates",
                CommandOutput::ok("linux 6.7.4-1 -> 6.7.5-1\nmesa 23.3.5-1 -> 24.0.1-1\n"),
            )
            .respond("pacman -Qdtq", CommandOutput::ok("libfoo\nold-dep\n"));
        stage_ctx!(ctx, &runner, &config, root = true);

        let outcome = PacmanHandler.execute(&ctx).unwrap();
        assert_eq!(
            outcome,
            StageOutcome::Updated {
                items: vec!["linux".into(), "mesa".into()]
            }
        );
        assert_eq!(
            runner.calls(),
            vec![
                "checkupdates",
                "pacman -Sy",
                "pacman -Su --noconfirm",
                "pacman -Qdtq",
                "pacman -Rns --noconfirm libfoo old-dep",
                "pacman -Sc --noconfirm",
            ]
        );
    }

    #[test]
    fn falls_back_to_pacman_qu() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = ScriptedRunner::new()
            .with_tool("pacman")
            .respond("pacman -Qu", CommandOutput::ok("vim 9.1.0-1 -> 9.1.1-1\n"))
            .respond("pacman -Qdtq", CommandOutput::failed(1, ""));
        stage_ctx!(ctx, &runner, &config, root = true);

        let outcome = PacmanHandler.execute(&ctx).unwrap();
        assert_eq!(
            outcome,
            StageOutcome::Updated {
                items: vec!["vim".into()]
            }
        );
        assert!(!runner.called("checkupdates"));
        assert!(!runner.called("-Rns"));
    }

    #[test]
    fn upgrade_failure_skips_cleanup() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = ScriptedRunner::new()
            .with_tool("pacman")
            .respond("pacman -Su", CommandOutput::failed(1, "conflicting files"));
        stage_ctx!(ctx, &runner, &config, root = true);

        assert!(PacmanHandler.execute(&ctx).is_err());
        assert!(!runner.called("-Sc"));
    }
}
