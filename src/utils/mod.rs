pub mod path_validator;
pub mod progress;

pub use path_validator::PathValidator;
