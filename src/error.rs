use thiserror::Error;

#[derive(Error, Debug)]
pub enum DotupError {
    #[error("{0} is not installed")]
    ToolAbsent(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Failed to execute '{command}': {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' failed with exit code {code}{}", format_stderr(.stderr))]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("HEAD is detached; check out a branch first")]
    DetachedHead,

    #[error("Could not find {remote}/main or {remote}/master")]
    NoDefaultBranch { remote: String },

    #[error("Could not find {remote}/{branch}")]
    BranchNotFound { remote: String, branch: String },

    #[error("Current branch '{0}' is the target branch; nothing to sync")]
    SelfTarget(String),

    #[error("Working tree has uncommitted or untracked changes")]
    DirtyWorkingTree,

    #[error("{operation} stopped because of conflicts")]
    Conflict {
        operation: String,
        remediation: Vec<String>,
    },

    #[error("Rebase finished but restoring stashed changes failed ({stash})")]
    StashRestore { stash: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl DotupError {
    /// Errors that mean "this stage cannot run here" rather than "this stage broke".
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            DotupError::ToolAbsent(_) | DotupError::PermissionDenied(_)
        )
    }

    /// Follow-up commands the user should run to recover.
    pub fn remediation(&self) -> Vec<String> {
        match self {
            DotupError::DetachedHead => vec!["git switch <branch>".to_string()],
            DotupError::DirtyWorkingTree => vec![
                "git stash push --include-untracked".to_string(),
                "git commit -am \"<message>\"".to_string(),
            ],
            DotupError::Conflict { remediation, .. } => remediation.clone(),
            DotupError::StashRestore { stash } => vec![
                "git status".to_string(),
                "# resolve the conflicting files, then:".to_string(),
                format!("git stash pop  # restores {stash}"),
            ],
            DotupError::PermissionDenied(_) => vec!["sudo -v".to_string()],
            _ => Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DotupError>;
