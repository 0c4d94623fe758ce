use std::any::Any;

use crossterm::event::KeyEvent;

use crate::config::Config;
use crate::context::ControllerContext;
use crate::error::Result;

/// Control the propagation of an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFlow {
    Continue,
    Consumed,
}

/// Class-independent description of where a controller is looking from.
///
/// `yaw` and `pitch` are radians; the view direction is
/// `(cos(pitch)cos(yaw), cos(pitch)sin(yaw), sin(pitch))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: [f32; 3],
    pub yaw: f32,
    pub pitch: f32,
}

impl CameraPose {
    pub fn forward(&self) -> [f32; 3] {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        [cp * cy, cp * sy, sp]
    }
}

/// Contract implemented by every controller variant.
///
/// Identity (class id, display name, active flag) and the properties every
/// variant shares live on [`ControllerNode`](crate::ControllerNode); a variant
/// only owns its own fields and their config schema.
pub trait Controller: Any + Send {
    /// Subclass-specific setup, run once right after construction.
    fn on_initialize(&mut self, _ctx: &ControllerContext) -> Result<()> {
        Ok(())
    }

    /// Called when the controller becomes current. There is no deactivate:
    /// controllers leaving the current slot are destroyed.
    fn on_activate(&mut self) {}

    /// Return to a sane initial state.
    fn reset(&mut self);

    fn update(&mut self, _wall_dt: f32, _ros_dt: f32) {}

    fn handle_key(&mut self, _key: &KeyEvent) -> EventFlow {
        EventFlow::Continue
    }

    fn load(&mut self, config: &Config) -> Result<()>;

    fn save(&self, config: &mut Config);

    /// Adopt equivalent state from a controller of a possibly different class.
    fn mimic(&mut self, _previous: &dyn Controller) {}

    /// Class-specific hand-off when this controller replaces `previous`.
    fn transition_from(&mut self, _previous: &dyn Controller) {}

    fn camera_pose(&self) -> Option<CameraPose> {
        None
    }

    /// Report (and clear) whether persisted fields changed since the last call.
    fn take_config_changed(&mut self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
