//! Effective configuration: defaults, user config, project config, and
//! environment overrides, merged per §4.10.

pub mod loader;
pub mod types;

pub use loader::load_config;
pub use types::{AppConfig, FeedbackConfig, FiltersConfig, OutputConfig, OutputFormat, SyncConfig, UserConfig};
