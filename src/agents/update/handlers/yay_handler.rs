use super::{StageHandler, StepKind, StepRunner, parse_arrow_updates, print_pending, query};
use crate::agents::tool_detector::Tool;
use crate::agents::update::context::{Stage, StageContext, StageOutcome};
use crate::error::{DotupError, Result};
use crate::process::CommandSpec;

/// Yay: `-Sy` -> `-Su` (repo and AUR) -> `-Yc` -> `-Sc`.
///
/// yay calls sudo itself and refuses to run as root.
pub struct YayHandler;

impl YayHandler {
    fn yay<const N: usize>(args: [&str; N]) -> CommandSpec {
        CommandSpec::new("yay").args(args)
    }
}

impl StageHandler for YayHandler {
    fn stage(&self) -> Stage {
        Stage::Yay
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutcome> {
        if !ctx.detector.is_present(Tool::Yay) {
            return Err(DotupError::ToolAbsent("yay".to_string()));
        }
        if ctx.privilege.is_root() {
            return Err(DotupError::PermissionDenied(
                "yay refuses to run as root".to_string(),
            ));
        }

        let before = match query(ctx, &Self::yay(["-Qu"]), "Checking repo and AUR updates...") {
            Some(output) => parse_arrow_updates(&output.stdout)?,
            None => Vec::new(),
        };
        print_pending(&before);

        let mut steps = StepRunner::new(ctx);
        steps.run(StepKind::Sync, Self::yay(["-Sy"]))?;
        steps.run(StepKind::Upgrade, Self::yay(["-Su", "--noconfirm"]))?;
        steps.run(StepKind::Orphans, Self::yay(["-Yc", "--noconfirm"]))?;
        steps.run(StepKind::Cache, Self::yay(["-Sc", "--noconfirm"]))?;

        Ok(steps.finish(before))
    }
}
