use crate::error::{DotupError, Result};
use crate::utils::PathValidator;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = "dotup";
const CONFIG_FILE_NAME: &str = "config.toml";

/// On-disk shape of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    dotfiles_dir: Option<PathBuf>,
    remote: Option<String>,
    nvm_dir: Option<PathBuf>,
    default_packages_file: Option<PathBuf>,
    zinit_home: Option<PathBuf>,
    sudo_prompt: Option<bool>,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Clone of the dotfiles repository checked by the self-update stage.
    pub dotfiles_dir: PathBuf,
    /// Remote name used for fetches, pulls and target branch lookup.
    pub remote: String,
    /// nvm installation; `nvm.sh` is sourced from here.
    pub nvm_dir: PathBuf,
    /// One package per line, `#` comments, enforced on every node runtime.
    pub default_packages_file: PathBuf,
    /// Directory holding `zinit.zsh`.
    pub zinit_home: PathBuf,
    /// Allow a single interactive `sudo -v` when cached credentials are missing.
    pub sudo_prompt: bool,
}

impl Config {
    /// Load configuration from `explicit`, or from the default location when
    /// no path is given. A missing default file yields defaults; a missing
    /// explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();

        let path = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(DotupError::Config(format!(
                        "Config file '{}' not found",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => Self::default_path().filter(|p| p.is_file()),
        };

        let raw = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    DotupError::Config(format!("Failed to read '{}': {e}", path.display()))
                })?;
                toml::from_str(&content)?
            }
            None => RawConfig::default(),
        };

        Ok(Self::resolve(raw, &env))
    }

    /// `$XDG_CONFIG_HOME/dotup/config.toml` (or the platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    fn resolve(raw: RawConfig, env: &dyn Fn(&str) -> Option<String>) -> Self {
        let env_path = |key: &str| env(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        let dotfiles_dir = raw
            .dotfiles_dir
            .or_else(|| env_path("DOTFILES_DIR"))
            .unwrap_or_else(|| PathBuf::from("~/.dotfiles"));

        let nvm_dir = raw
            .nvm_dir
            .or_else(|| env_path("NVM_DIR"))
            .unwrap_or_else(|| PathBuf::from("~/.nvm"));
        let nvm_dir = PathValidator::expand_home(nvm_dir);

        let default_packages_file = raw
            .default_packages_file
            .map(PathValidator::expand_home)
            .unwrap_or_else(|| nvm_dir.join("default-packages"));

        let zinit_home = raw
            .zinit_home
            .or_else(|| env_path("ZINIT_HOME"))
            .unwrap_or_else(|| PathBuf::from("~/.local/share/zinit/zinit.git"));

        Self {
            dotfiles_dir: PathValidator::expand_home(dotfiles_dir),
            remote: raw.remote.unwrap_or_else(|| "origin".to_string()),
            nvm_dir,
            default_packages_file,
            zinit_home: PathValidator::expand_home(zinit_home),
            sudo_prompt: raw.sudo_prompt.unwrap_or(true),
        }
    }
}
