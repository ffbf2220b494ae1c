/// TOML configuration (`sleuth.toml`).
pub mod toml_config;

pub use toml_config::{ConfigError, SleuthConfig};
