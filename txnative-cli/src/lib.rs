//! CLI library for testing purposes

pub mod path_glob;
pub mod pull;
pub mod push;
pub mod settings;
pub mod validation;

pub use path_glob::expand_input_globs;
pub use settings::{Overrides, load_config};
