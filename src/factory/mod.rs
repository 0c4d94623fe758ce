mod core;

pub use core::{ControllerConstructor, ControllerFactory};
