use crate::config::Config;
use crate::process::CommandRunner;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// External tools the update run may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tool {
    Git,
    Zinit,
    Brew,
    AptGet,
    Pacman,
    Yay,
    Npm,
    Nvm,
    Sudo,
}

impl Tool {
    pub const ALL: [Tool; 9] = [
        Tool::Git,
        Tool::Zinit,
        Tool::Brew,
        Tool::AptGet,
        Tool::Pacman,
        Tool::Yay,
        Tool::Npm,
        Tool::Nvm,
        Tool::Sudo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Git => "git",
            Tool::Zinit => "zinit",
            Tool::Brew => "brew",
            Tool::AptGet => "apt-get",
            Tool::Pacman => "pacman",
            Tool::Yay => "yay",
            Tool::Npm => "npm",
            Tool::Nvm => "nvm",
            Tool::Sudo => "sudo",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which tools were present when the run started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    present: BTreeSet<Tool>,
}

impl Capabilities {
    pub fn from_tools<I: IntoIterator<Item = Tool>>(tools: I) -> Self {
        Self {
            present: tools.into_iter().collect(),
        }
    }

    pub fn has(&self, tool: Tool) -> bool {
        self.present.contains(&tool)
    }

    pub fn iter(&self) -> impl Iterator<Item = Tool> + '_ {
        self.present.iter().copied()
    }
}

/// ToolDetectorAgent answers "is this tool usable on this host right now".
///
/// Executables are looked up on the search path. nvm and zinit are shell
/// functions, so they count as present when their loader script exists and
/// the shell that sources it is installed.
pub struct ToolDetectorAgent<'a> {
    runner: &'a dyn CommandRunner,
    nvm_dir: PathBuf,
    zinit_home: PathBuf,
}

impl<'a> ToolDetectorAgent<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &Config) -> Self {
        Self {
            runner,
            nvm_dir: config.nvm_dir.clone(),
            zinit_home: config.zinit_home.clone(),
        }
    }

    pub fn is_present(&self, tool: Tool) -> bool {
        match tool {
            Tool::Nvm => {
                self.nvm_script().is_file() && self.runner.is_available("bash")
            }
            Tool::Zinit => {
                self.zinit_script().is_file() && self.runner.is_available("zsh")
            }
            other => self.runner.is_available(other.name()),
        }
    }

    /// Probe every known tool once.
    pub fn detect(&self) -> Capabilities {
        let caps = Capabilities::from_tools(Tool::ALL.into_iter().filter(|t| self.is_present(*t)));
        tracing::debug!(
            present = ?caps.iter().map(|t| t.name()).collect::<Vec<_>>(),
            "detected tools"
        );
        caps
    }

    pub fn nvm_script(&self) -> PathBuf {
        self.nvm_dir.join("nvm.sh")
    }

    pub fn zinit_script(&self) -> PathBuf {
        self.zinit_home.join("zinit.zsh")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::ScriptedRunner;
    use std::fs;
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path) -> Config {
        Config {
            nvm_dir: dir.join("nvm"),
            zinit_home: dir.join("zinit"),
            default_packages_file: dir.join("nvm/default-packages"),
            dotfiles_dir: dir.join("dots"),
            remote: "origin".into(),
            sudo_prompt: false,
        }
    }

    #[test]
    fn executables_come_from_search_path() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let runner = ScriptedRunner::new().with_tools(&["brew", "git"]);
        let detector = ToolDetectorAgent::new(&runner, &config);

        let caps = detector.detect();
        assert!(caps.has(Tool::Brew));
        assert!(caps.has(Tool::Git));
        assert!(!caps.has(Tool::Pacman));
        assert!(!caps.has(Tool::Nvm));
    }

    #[test]
    fn shell_function_tools_need_loader_and_shell() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        fs::create_dir_all(&config.nvm_dir).unwrap();
        fs::write(config.nvm_dir.join("nvm.sh"), "# nvm").unwrap();
        fs::create_dir_all(&config.zinit_home).unwrap();
        fs::write(config.zinit_home.join("zinit.zsh"), "# zinit").unwrap();

        let without_shells = ScriptedRunner::new();
        let detector = ToolDetectorAgent::new(&without_shells, &config);
        assert!(!detector.is_present(Tool::Nvm));
        assert!(!detector.is_present(Tool::Zinit));

        let with_shells = ScriptedRunner::new().with_tools(&["bash", "zsh"]);
        let detector = ToolDetectorAgent::new(&with_shells, &config);
        assert!(detector.is_present(Tool::Nvm));
        assert!(detector.is_present(Tool::Zinit));
    }
}
