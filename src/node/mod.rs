pub mod default_packages;
pub mod npm;
pub mod version;

pub use default_packages::load_default_packages;
pub use npm::{NodeRuntime, NvmSession, parse_global_list, parse_outdated};
