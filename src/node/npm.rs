use super::version::{NodeVersion, parse_nvm_ls};
use crate::error::Result;
use crate::process::{CommandRunner, CommandSpec, shell_quote};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
struct GlobalList {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
}

/// Names of globally installed packages from `npm ls -g --depth=0 --json`.
pub fn parse_global_list(json: &str) -> Result<Vec<String>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let list: GlobalList = serde_json::from_str(json)?;
    Ok(list.dependencies.into_keys().collect())
}

/// Names of packages with newer versions from `npm outdated -g --json`.
pub fn parse_outdated(json: &str) -> Result<Vec<String>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let outdated: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
    Ok(outdated.into_keys().collect())
}

/// Where npm commands run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRuntime {
    /// A version managed by nvm, selected inside each child shell.
    Nvm { script: PathBuf, version: NodeVersion },
    /// Whatever `npm` is on the search path.
    System,
}

impl NodeRuntime {
    pub fn label(&self) -> String {
        match self {
            NodeRuntime::Nvm { version, .. } => format!("node {version}"),
            NodeRuntime::System => "system node".to_string(),
        }
    }

    pub fn npm<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self {
            NodeRuntime::Nvm { script, version } => {
                let args: Vec<String> = args.into_iter().map(|a| shell_quote(a.as_ref())).collect();
                let script = format!(
                    ". {} && nvm use --silent {} >/dev/null && npm {}",
                    shell_quote(&script.to_string_lossy()),
                    version,
                    args.join(" ")
                );
                CommandSpec::shell_script("bash", script)
            }
            NodeRuntime::System => {
                CommandSpec::new("npm").args(args.into_iter().map(|a| a.as_ref().to_string()))
            }
        }
    }
}

/// Talks to nvm on behalf of the npm stage.
///
/// nvm is a shell function, so every call sources `nvm.sh` in a fresh bash.
/// Selecting a runtime only affects that child shell and the user's active
/// runtime is never switched.
pub struct NvmSession<'a> {
    runner: &'a dyn CommandRunner,
    script: PathBuf,
}

impl<'a> NvmSession<'a> {
    pub fn new(runner: &'a dyn CommandRunner, script: &Path) -> Self {
        Self {
            runner,
            script: script.to_path_buf(),
        }
    }

    fn nvm(&self, command: &str) -> CommandSpec {
        CommandSpec::shell_script(
            "bash",
            format!(
                ". {} && nvm {command}",
                shell_quote(&self.script.to_string_lossy())
            ),
        )
    }

    /// The runtime the user's shells resolve to, if nvm has one selected.
    pub fn current(&self) -> Option<String> {
        let current = self
            .runner
            .capture(&self.nvm("current"))
            .ok()
            .filter(|o| o.success())
            .map(|o| o.stdout_trimmed().to_string())
            .filter(|v| !v.is_empty() && v != "none");
        tracing::debug!(current = ?current, "nvm current runtime");
        current
    }

    pub fn installed_versions(&self) -> Result<Vec<NodeVersion>> {
        let spec = self.nvm("ls --no-colors");
        let output = self.runner.capture(&spec)?.ensure_success(&spec)?;
        parse_nvm_ls(&output.stdout)
    }

    /// npm commands built from the returned runtime run under `version`.
    pub fn runtime(&self, version: &NodeVersion) -> NodeRuntime {
        NodeRuntime::Nvm {
            script: self.script.clone(),
            version: version.clone(),
        }
    }
}
