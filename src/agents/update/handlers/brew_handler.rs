use super::{StageHandler, StepKind, StepRunner, print_pending, query};
use crate::agents::tool_detector::Tool;
use crate::agents::update::context::{Stage, StageContext, StageOutcome};
use crate::error::{DotupError, Result};
use crate::process::CommandSpec;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct BrewOutdated {
    #[serde(default)]
    formulae: Vec<BrewEntry>,
    #[serde(default)]
    casks: Vec<BrewEntry>,
}

#[derive(Debug, Deserialize)]
struct BrewEntry {
    name: String,
}

/// Formula and cask names from `brew outdated --json=v2`.
pub fn parse_brew_outdated(json: &str) -> Result<Vec<String>> {
    let outdated: BrewOutdated = serde_json::from_str(json)?;
    Ok(outdated
        .formulae
        .into_iter()
        .chain(outdated.casks)
        .map(|entry| entry.name)
        .collect())
}

/// Homebrew: `update` -> `upgrade --formula` -> `upgrade --cask` ->
/// `autoremove` -> `cleanup`.
pub struct BrewHandler;

impl BrewHandler {
    fn brew<const N: usize>(args: [&str; N]) -> CommandSpec {
        CommandSpec::new("brew").args(args)
    }
}

impl StageHandler for BrewHandler {
    fn stage(&self) -> Stage {
        Stage::Homebrew
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutcome> {
        if !ctx.detector.is_present(Tool::Brew) {
            return Err(DotupError::ToolAbsent("brew".to_string()));
        }
        if ctx.privilege.is_root() {
            return Err(DotupError::PermissionDenied(
                "Homebrew refuses to run as root".to_string(),
            ));
        }

        let before = query(
            ctx,
            &Self::brew(["outdated", "--json=v2"]),
            "Checking outdated formulae and casks...",
        )
        .and_then(|output| match parse_brew_outdated(&output.stdout) {
            Ok(items) => Some(items),
            Err(e) => {
                tracing::debug!(error = %e, "unreadable brew outdated output");
                None
            }
        })
        .unwrap_or_default();
        print_pending(&before);

        let mut steps = StepRunner::new(ctx);
        steps.run(StepKind::Sync, Self::brew(["update"]))?;
        steps.run(StepKind::Upgrade, Self::brew(["upgrade", "--formula"]))?;
        steps.run(StepKind::Secondary, Self::brew(["upgrade", "--cask"]))?;
        steps.run(StepKind::Orphans, Self::brew(["autoremove"]))?;
        steps.run(StepKind::Cache, Self::brew(["cleanup"]))?;

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

    const OUTDATED: &str = r#"{
  "formulae": [
    { "name": "git", "installed_versions": ["2.43.0"], "current_version": "2.44.0" },
    { "name": "ripgrep", "installed_versions": ["14.0.0"], "current_version": "14.1.0" }
  ],
  "casks": [
    { "name": "wezterm", "installed_versions": ["2024"], "current_version": "2025" }
  ]
}"#;

    #[test]
    fn parses_formulae_then_casks() {
        assert_eq!(
            parse_brew_outdated(OUTDATED).unwrap(),
            vec!["git".to_string(), "ripgrep".to_string(), "wezterm".to_string()]
        );
        assert!(parse_brew_outdated("{}").unwrap().is_empty());
    }

    #[test]
    fn runs_sub_steps_in_order_and_reports_outdated_items() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = ScriptedRunner::new()
            .with_tool("brew")
            .respond("brew outdated --json=v2", CommandOutput::ok(OUTDATED));
        stage_ctx!(ctx, &runner, &config, root = false);

        let outcome = BrewHandler.execute(&ctx).unwrap();
        assert_eq!(
            outcome,
            StageOutcome::Updated {
                items: vec!["git".into(), "ripgrep".into(), "wezterm".into()]
            }
        );
        assert_eq!(
            runner.calls(),
            vec![
                "brew outdated --json=v2",
                "brew update",
                "brew upgrade --formula",
                "brew upgrade --cask",
                "brew autoremove",
                "brew cleanup",
            ]
        );
    }

    #[test]
    fn failed_upgrade_stops_the_stage() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = ScriptedRunner::new()
            .with_tool("brew")
            .respond("brew upgrade --formula", CommandOutput::failed(1, "Error: no bottle"));
        stage_ctx!(ctx, &runner, &config, root = false);

        let err = BrewHandler.execute(&ctx).unwrap_err();
        assert!(matches!(err, DotupError::CommandFailed { .. }));
        assert!(!runner.called("brew upgrade --cask"));
        assert!(!runner.called("brew cleanup"));
    }

    #[test]
    fn cleanup_failures_are_tolerated() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = ScriptedRunner::new()
            .with_tool("brew")
            .respond("brew autoremove", CommandOutput::failed(1, "locked"))
            .respond("brew cleanup", CommandOutput::failed(1, "locked"));
        stage_ctx!(ctx, &runner, &config, root = false);

        let outcome = BrewHandler.execute(&ctx).unwrap();
        assert!(matches!(outcome, StageOutcome::Updated { .. }));
    }

    #[test]
    fn absent_brew_is_a_precondition_failure() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = ScriptedRunner::new();
        stage_ctx!(ctx, &runner, &config, root = false);

        let err = BrewHandler.execute(&ctx).unwrap_err();
        assert!(err.is_precondition());
        assert!(runner.calls().is_empty());
    }
}
