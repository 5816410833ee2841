use super::{StageHandler, StepKind, StepRunner};
use crate::agents::tool_detector::Tool;
use crate::agents::update::context::{Stage, StageContext, StageOutcome};
use crate::error::{DotupError, Result};
use crate::process::{CommandSpec, shell_quote};
use std::path::Path;

/// Zinit: `self-update` -> `update --all` -> `delete --clean --yes` -> `cclear`.
///
/// zinit only exists inside zsh, so each command sources `zinit.zsh` in a
/// fresh `zsh -c`. Zinit backgrounds some of its work; `--parallel` is left
/// off so the child exits only when the update is complete.
pub struct ZinitHandler;

impl ZinitHandler {
    fn zinit(script: &Path, command: &str) -> CommandSpec {
        CommandSpec::shell_script(
            "zsh",
            format!(
                "source {} && zinit {command}",
                shell_quote(&script.to_string_lossy())
            ),
        )
    }
}

impl StageHandler for ZinitHandler {
    fn stage(&self) -> Stage {
        Stage::Zinit
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutcome> {
        if !ctx.detector.is_present(Tool::Zinit) {
            return Err(DotupError::ToolAbsent("zinit".to_string()));
        }
        let script = ctx.detector.zinit_script();

        let mut steps = StepRunner::new(ctx);
        steps.run(StepKind::Sync, Self::zinit(&script, "self-update"))?;
        steps.run(StepKind::Upgrade, Self::zinit(&script, "update --all"))?;
        steps.run(StepKind::Orphans, Self::zinit(&script, "delete --clean --yes"))?;
        steps.run(StepKind::Cache, Self::zinit(&script, "cclear"))?;

        Ok(steps.finish(Vec::new()))
    }
}
