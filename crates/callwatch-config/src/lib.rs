//! Configuration loading for the callwatch stack

pub mod stack_config;
pub mod toml_config;

pub use stack_config::{AmiConfig, Config, ReplayConfig, RunMode};
