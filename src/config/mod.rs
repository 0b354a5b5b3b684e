//! Configuration loading and bootstrap
//!
//! - `loader`: layered loading from embedded defaults, project files and environment

pub mod loader;

pub use loader::{load_config, save_config, DEFAULT_CONFIG};
