mod core;

pub use core::ControllerContainer;
