mod core;

pub use core::{Config, ConfigValue};
