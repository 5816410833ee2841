pub mod branch_sync;
pub mod privilege;
pub mod self_update;
pub mod tool_detector;
pub mod version_control;

pub mod update;

pub use branch_sync::{BranchSyncAgent, BranchSyncOptions, SyncMode, SyncResult};
pub use privilege::PrivilegeAgent;
pub use tool_detector::ToolDetectorAgent;
pub use version_control::VersionControlAgent;
