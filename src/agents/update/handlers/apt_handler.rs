use super::{StageHandler, StepKind, StepRunner, print_pending, query};
use crate::agents::tool_detector::Tool;
use crate::agents::update::context::{Stage, StageContext, StageOutcome};
use crate::error::{DotupError, Result};
use crate::process::CommandSpec;
use regex::Regex;

/// Package names from `apt list --upgradable`.
///
/// Lines look like `curl/jammy-updates 7.81.0-1ubuntu1.16 amd64 [upgradable
/// from: ...]`; the `Listing...` header and warnings are ignored.
pub fn parse_apt_upgradable(output: &str) -> Result<Vec<String>> {
    let line_regex = Regex::new(r"^([A-Za-z0-9][A-Za-z0-9+.\-]*)/\S+")
        .map_err(|e| DotupError::Parse(format!("Regex error: {}", e)))?;

    Ok(output
        .lines()
        .filter_map(|line| line_regex.captures(line))
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect())
}

/// APT: `update` -> `upgrade -y` -> `autoremove -y` -> `autoclean`.
pub struct AptHandler;

impl StageHandler for AptHandler {
    fn stage(&self) -> Stage {
        Stage::Apt
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutcome> {
        if !ctx.detector.is_present(Tool::AptGet) {
            return Err(DotupError::ToolAbsent("apt-get".to_string()));
        }
        let elevation = ctx.privilege.acquire()?;
        let apt_get = |args: &[&str]| elevation.apply(CommandSpec::new("apt-get").args(args.iter().copied()));

        let before = query(
            ctx,
            &CommandSpec::new("apt").args(["list", "--upgradable"]),
            "Checking upgradable packages...",
        )
        .map(|output| parse_apt_upgradable(&output.stdout))
        .transpose()?
        .unwrap_or_default();
        print_pending(&before);

        let mut steps = StepRunner::new(ctx);
        steps.run(StepKind::Sync, apt_get(&["update"]))?;
        steps.run(StepKind::Upgrade, apt_get(&["upgrade", "-y"]))?;
        steps.run(StepKind::Orphans, apt_get(&["autoremove", "-y"]))?;
        steps.run(StepKind::Cache, apt_get(&["autoclean"]))?;

        Ok(steps.finish(before))
    }
}
