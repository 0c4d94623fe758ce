mod config;
mod core;

pub use config::RegistryConfig;
pub use core::{ControllerRegistry, CurrentAlias, InstallMode, LoadReport, SkippedEntry};
