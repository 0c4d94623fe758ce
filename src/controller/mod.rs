mod core;
mod node;

pub use core::{CameraPose, Controller, EventFlow};
pub use node::{ControllerId, ControllerNode, HookId, StereoSettings};
