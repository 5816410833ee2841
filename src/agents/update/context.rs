use crate::agents::privilege::PrivilegeAgent;
use crate::agents::tool_detector::ToolDetectorAgent;
use crate::config::Config;
use crate::process::CommandRunner;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// One update routine. Variant order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    GitSelfUpdate,
    Zinit,
    Homebrew,
    Apt,
    Pacman,
    Yay,
    Npm,
}

impl Stage {
    pub const ORDER: [Stage; 7] = [
        Stage::GitSelfUpdate,
        Stage::Zinit,
        Stage::Homebrew,
        Stage::Apt,
        Stage::Pacman,
        Stage::Yay,
        Stage::Npm,
    ];

    /// Package-manager stages, selectable by CLI flag.
    pub const PACKAGE_MANAGERS: [Stage; 6] = [
        Stage::Zinit,
        Stage::Homebrew,
        Stage::Apt,
        Stage::Pacman,
        Stage::Yay,
        Stage::Npm,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::GitSelfUpdate => "Dotfiles",
            Stage::Zinit => "Zinit",
            Stage::Homebrew => "Homebrew",
            Stage::Apt => "APT",
            Stage::Pacman => "Pacman",
            Stage::Yay => "Yay",
            Stage::Npm => "npm",
        }
    }

    /// What the summary calls the items this stage updates.
    pub fn item_label(&self) -> &'static str {
        match self {
            Stage::Homebrew => "formulae/casks",
            Stage::Npm => "global packages",
            _ => "packages",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Final state of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Updated,
    Skipped,
    Failed,
}

/// What a handler reports back after running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// At least one underlying action succeeded.
    Updated { items: Vec<String> },
    Skipped(String),
    Failed(String),
}

impl StageOutcome {
    pub fn updated() -> Self {
        StageOutcome::Updated { items: Vec::new() }
    }
}

/// Tracks what happened to every stage during one run.
///
/// Owned by the top-level run and passed by reference into the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    statuses: Vec<(Stage, StageStatus)>,
    items: HashMap<Stage, Vec<String>>,
    skip_reasons: Vec<(Stage, String)>,
    failures: Vec<(Stage, String)>,
}

impl UpdateReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a handler's outcome. A later record for the same stage replaces
    /// the earlier one.
    pub fn record(&mut self, stage: Stage, outcome: StageOutcome) {
        self.statuses.retain(|(s, _)| *s != stage);
        self.skip_reasons.retain(|(s, _)| *s != stage);
        self.failures.retain(|(s, _)| *s != stage);

        match outcome {
            StageOutcome::Updated { items } => {
                self.statuses.push((stage, StageStatus::Updated));
                self.add_items(stage, items);
            }
            StageOutcome::Skipped(reason) => {
                self.statuses.push((stage, StageStatus::Skipped));
                self.skip_reasons.push((stage, reason));
            }
            StageOutcome::Failed(reason) => {
                self.statuses.push((stage, StageStatus::Failed));
                self.failures.push((stage, reason));
            }
        }
    }

    pub fn skip(&mut self, stage: Stage, reason: impl Into<String>) {
        self.record(stage, StageOutcome::Skipped(reason.into()));
    }

    pub fn add_items<I: IntoIterator<Item = String>>(&mut self, stage: Stage, items: I) {
        self.items.entry(stage).or_default().extend(items);
    }

    pub fn status(&self, stage: Stage) -> Option<StageStatus> {
        self.statuses
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, status)| *status)
    }

    pub fn updated_stages(&self) -> Vec<Stage> {
        self.stages_with(StageStatus::Updated)
    }

    pub fn skipped(&self) -> &[(Stage, String)] {
        &self.skip_reasons
    }

    pub fn failures(&self) -> &[(Stage, String)] {
        &self.failures
    }

    pub fn skip_reason(&self, stage: Stage) -> Option<&str> {
        self.skip_reasons
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, reason)| reason.as_str())
    }

    /// Items as recorded, duplicates included.
    pub fn raw_items(&self, stage: Stage) -> &[String] {
        self.items.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Items trimmed, deduplicated by exact match and sorted.
    pub fn unique_items(&self, stage: Stage) -> Vec<String> {
        self.raw_items(stage)
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Stages that recorded item names, in run order.
    pub fn item_stages(&self) -> Vec<Stage> {
        Stage::ORDER
            .into_iter()
            .filter(|stage| !self.unique_items(*stage).is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    fn stages_with(&self, status: StageStatus) -> Vec<Stage> {
        self.statuses
            .iter()
            .filter(|(_, s)| *s == status)
            .map(|(stage, _)| *stage)
            .collect()
    }
}

/// Everything a stage handler needs from the outside world.
pub struct StageContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub detector: &'a ToolDetectorAgent<'a>,
    pub privilege: &'a PrivilegeAgent<'a>,
    pub config: &'a Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unique_items_trim_dedupe_and_sort() {
        let mut report = UpdateReport::new();
        report.add_items(
            Stage::Npm,
            vec![
                "typescript".to_string(),
                " eslint".to_string(),
                "typescript ".to_string(),
                "".to_string(),
            ],
        );
        report.add_items(Stage::Npm, vec!["eslint".to_string()]);

        assert_eq!(report.raw_items(Stage::Npm).len(), 5);
        assert_eq!(
            report.unique_items(Stage::Npm),
            vec!["eslint".to_string(), "typescript".to_string()]
        );
    }

    #[test]
    fn record_keeps_one_status_per_stage() {
        let mut report = UpdateReport::new();
        report.skip(Stage::Apt, "not requested by user");
        report.record(Stage::Apt, StageOutcome::Failed("boom".into()));

        assert_eq!(report.status(Stage::Apt), Some(StageStatus::Failed));
        assert!(report.skipped().is_empty());
        assert_eq!(report.failures().len(), 1);
    }

    #[test]
    fn updated_stages_follow_record_order() {
        let mut report = UpdateReport::new();
        report.record(Stage::Homebrew, StageOutcome::updated());
        report.skip(Stage::Apt, "apt-get is not installed");
        report.record(
            Stage::Npm,
            StageOutcome::Updated {
                items: vec!["npm".into()],
            },
        );

        assert_eq!(report.updated_stages(), vec![Stage::Homebrew, Stage::Npm]);
        assert_eq!(report.item_stages(), vec![Stage::Npm]);
        assert_eq!(report.skip_reason(Stage::Apt), Some("apt-get is not installed"));
    }
}
