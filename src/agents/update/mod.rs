// Update module - runs the package-manager stages of `update-all`
//
// Architecture:
// - Stage / UpdateReport: what runs and what happened to it
// - StageSelection: which stages the user asked for
// - dispatcher: turns a selection plus detected tools into a plan and runs it
// - handlers: one StageHandler per package manager
pub mod context;
pub mod dispatcher;
pub mod handlers;
pub mod selection;

pub use context::{Stage, StageContext, StageOutcome, StageStatus, UpdateReport};
pub use dispatcher::{StageDispatcher, plan};
pub use selection::StageSelection;
