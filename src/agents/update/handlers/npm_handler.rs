use super::{StageHandler, print_pending, query};
use crate::agents::tool_detector::Tool;
use crate::agents::update::context::{Stage, StageContext, StageOutcome};
use crate::error::{DotupError, Result};
use crate::node::{NodeRuntime, NvmSession, load_default_packages, parse_global_list, parse_outdated};
use crate::utils::progress::spinner;
use colored::Colorize;
use std::collections::BTreeSet;

/// Global npm packages, once per installed node runtime.
///
/// Each pass installs the default packages that are missing plus everything
/// `npm outdated` reports, in one `npm install -g` call.
pub struct NpmHandler;

impl NpmHandler {
    fn globals(ctx: &StageContext<'_>, runtime: &NodeRuntime) -> Option<BTreeSet<String>> {
        let output = query(
            ctx,
            &runtime.npm(["ls", "-g", "--depth=0", "--json"]),
            "Listing global packages...",
        )?;
        match parse_global_list(&output.stdout) {
            Ok(names) => Some(names.into_iter().collect()),
            Err(e) => {
                tracing::debug!(error = %e, "unreadable npm ls output");
                None
            }
        }
    }

    /// `npm outdated` exits 1 when it finds something, so stdout is parsed
    /// whatever the exit code.
    fn outdated(ctx: &StageContext<'_>, runtime: &NodeRuntime) -> Vec<String> {
        let spec = runtime.npm(["outdated", "-g", "--json"]);
        let pb = spinner("Checking outdated global packages...");
        let result = ctx.runner.capture(&spec);
        pb.finish_and_clear();

        match result.map(|output| parse_outdated(&output.stdout)) {
            Ok(Ok(names)) => names,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "unreadable npm outdated output");
                Vec::new()
            }
            Err(e) => {
                tracing::debug!(error = %e, "npm outdated failed");
                Vec::new()
            }
        }
    }

    /// One runtime: returns the packages it installed or upgraded.
    fn pass(ctx: &StageContext<'_>, runtime: &NodeRuntime, defaults: &[String]) -> Result<Vec<String>> {
        println!("   {}", runtime.label().bold());

        let missing: Vec<String> = match Self::globals(ctx, runtime) {
            Some(installed) => defaults
                .iter()
                .filter(|name| !installed.contains(*name))
                .cloned()
                .collect(),
            None => {
                tracing::debug!(runtime = %runtime.label(), "global list unavailable, not enforcing defaults");
                Vec::new()
            }
        };
        if !missing.is_empty() {
            println!("   missing defaults: {}", missing.join(", ").bright_cyan());
        }

        let outdated = Self::outdated(ctx, runtime);
        print_pending(&outdated);

        let mut batch: Vec<String> = Vec::new();
        for name in missing.into_iter().chain(outdated) {
            if !batch.contains(&name) {
                batch.push(name);
            }
        }
        if batch.is_empty() {
            return Ok(batch);
        }

        let install = runtime.npm(
            ["install", "-g"]
                .into_iter()
                .map(str::to_string)
                .chain(batch.iter().cloned()),
        );
        ctx.runner.stream(&install)?.ensure_success(&install)?;
        Ok(batch)
    }

    /// A failing runtime is reported and the loop moves on.
    fn run_pass(
        ctx: &StageContext<'_>,
        runtime: &NodeRuntime,
        defaults: &[String],
        items: &mut Vec<String>,
    ) -> bool {
        match Self::pass(ctx, runtime, defaults) {
            Ok(installed) => {
                items.extend(installed);
                true
            }
            Err(e) => {
                tracing::warn!(runtime = %runtime.label(), error = %e, "npm pass failed");
                println!(
                    "   {}",
                    format!("⚠ {} failed, continuing: {}", runtime.label(), e).yellow()
                );
                false
            }
        }
    }
}

impl StageHandler for NpmHandler {
    fn stage(&self) -> Stage {
        Stage::Npm
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutcome> {
        let has_nvm = ctx.detector.is_present(Tool::Nvm);
        let has_npm = ctx.detector.is_present(Tool::Npm);
        if !has_nvm && !has_npm {
            return Err(DotupError::ToolAbsent("npm".to_string()));
        }

        let defaults = load_default_packages(&ctx.config.default_packages_file);
        tracing::debug!(count = defaults.len(), "default global packages");

        let mut items: Vec<String> = Vec::new();
        let mut attempted = 0usize;
        let mut succeeded = 0usize;

        if has_nvm {
            let nvm = NvmSession::new(ctx.runner, &ctx.detector.nvm_script());
            let current = nvm.current();
            let versions = nvm.installed_versions().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "could not list nvm versions");
                Vec::new()
            });

            for version in &versions {
                let runtime = nvm.runtime(version);
                tracing::debug!(%version, "npm pass under nvm");
                attempted += 1;
                if Self::run_pass(ctx, &runtime, &defaults, &mut items) {
                    succeeded += 1;
                }
            }

            if let Some(current) = current {
                println!("   Active node left at {}", current);
            }
        }

        if attempted == 0 {
            if !has_npm {
                return Ok(StageOutcome::Skipped("no node versions installed".to_string()));
            }
            if Self::run_pass(ctx, &NodeRuntime::System, &defaults, &mut items) {
                succeeded += 1;
            }
        }

        if succeeded > 0 {
            Ok(StageOutcome::Updated { items })
        } else {
            Ok(StageOutcome::Failed("no node runtime could be updated".to_string()))
        }
    }
}
