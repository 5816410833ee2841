use super::context::Stage;
use std::collections::BTreeSet;

/// Which stages the user asked for.
///
/// No package-manager flag means every package manager is enabled; any flag
/// switches to "only the named ones". The dotfiles check is controlled
/// separately by `--no-git-check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSelection {
    requested: BTreeSet<Stage>,
    git_check: bool,
}

impl StageSelection {
    pub fn all() -> Self {
        Self {
            requested: Stage::PACKAGE_MANAGERS.into_iter().collect(),
            git_check: true,
        }
    }

    /// Build from the named package-manager stages; an empty list means all.
    pub fn from_requested<I: IntoIterator<Item = Stage>>(stages: I, git_check: bool) -> Self {
        let requested: BTreeSet<Stage> = stages
            .into_iter()
            .filter(|stage| *stage != Stage::GitSelfUpdate)
            .collect();

        if requested.is_empty() {
            Self {
                git_check,
                ..Self::all()
            }
        } else {
            Self {
                requested,
                git_check,
            }
        }
    }

    pub fn is_requested(&self, stage: Stage) -> bool {
        match stage {
            Stage::GitSelfUpdate => self.git_check,
            other => self.requested.contains(&other),
        }
    }

    pub fn git_check(&self) -> bool {
        self.git_check
    }
}
