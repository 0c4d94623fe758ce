use std::any::Any;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use crate::config::Config;
use crate::controller::{CameraPose, Controller, EventFlow};
use crate::error::Result;

use super::{clamp_pitch, load_vec3, offset, save_vec3};

const LOOK_STEP: f32 = 0.05;

/// Free-flying camera moved with WASD.
#[derive(Debug, Clone)]
pub struct FirstPersonController {
    speed: f32,
    yaw: f32,
    pitch: f32,
    position: [f32; 3],
    config_changed: bool,
}

impl Default for FirstPersonController {
    fn default() -> Self {
        Self {
            speed: 1.0,
            yaw: 0.0,
            pitch: 0.0,
            position: [-5.0, 0.0, 1.5],
            config_changed: false,
        }
    }
}

impl FirstPersonController {
    pub const CLASS_ID: &'static str = "FirstPerson";

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
        self.config_changed = true;
    }

    pub fn position(&self) -> [f32; 3] {
        self.position
    }

    pub fn set_position(&mut self, position: [f32; 3]) {
        self.position = position;
        self.config_changed = true;
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn look(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch = clamp_pitch(self.pitch + delta_pitch);
        self.config_changed = true;
    }

    /// Move along the view direction (`forward`) and its horizontal
    /// perpendicular (`strafe`), both scaled by `speed`.
    pub fn step(&mut self, forward: f32, strafe: f32) {
        let pose = self.pose();
        let (sy, cy) = self.yaw.sin_cos();
        let right = [sy, -cy, 0.0];
        let moved = offset(self.position, pose.forward(), forward * self.speed);
        self.position = offset(moved, right, strafe * self.speed);
        self.config_changed = true;
    }

    fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.position,
            yaw: self.yaw,
            pitch: self.pitch,
        }
    }
}

impl Controller for FirstPersonController {
    fn reset(&mut self) {
        *self = Self {
            config_changed: true,
            ..Self::default()
        };
    }

    fn handle_key(&mut self, key: &KeyEvent) -> EventFlow {
        if key.kind == KeyEventKind::Release {
            return EventFlow::Continue;
        }
        match key.code {
            KeyCode::Char('w') => self.step(1.0, 0.0),
            KeyCode::Char('s') => self.step(-1.0, 0.0),
            KeyCode::Char('a') => self.step(0.0, -1.0),
            KeyCode::Char('d') => self.step(0.0, 1.0),
            KeyCode::Left => self.look(LOOK_STEP, 0.0),
            KeyCode::Right => self.look(-LOOK_STEP, 0.0),
            KeyCode::Up => self.look(0.0, LOOK_STEP),
            KeyCode::Down => self.look(0.0, -LOOK_STEP),
            _ => return EventFlow::Continue,
        }
        EventFlow::Consumed
    }

    fn load(&mut self, config: &Config) -> Result<()> {
        if let Some(speed) = config.map_get_float("speed") {
            self.speed = speed.max(0.0);
        }
        if let Some(yaw) = config.map_get_float("yaw") {
            self.yaw = yaw;
        }
        if let Some(pitch) = config.map_get_float("pitch") {
            self.pitch = clamp_pitch(pitch);
        }
        load_vec3(config, "position", &mut self.position);
        Ok(())
    }

    fn save(&self, config: &mut Config) {
        config.map_set_value("speed", self.speed);
        config.map_set_value("yaw", self.yaw);
        config.map_set_value("pitch", self.pitch);
        save_vec3(config, "position", self.position);
    }

    fn mimic(&mut self, previous: &dyn Controller) {
        let Some(pose) = previous.camera_pose() else {
            return;
        };
        self.position = pose.position;
        self.yaw = pose.yaw;
        self.pitch = clamp_pitch(pose.pitch);
        self.config_changed = true;
    }

    fn camera_pose(&self) -> Option<CameraPose> {
        Some(self.pose())
    }

    fn take_config_changed(&mut self) -> bool {
        std::mem::take(&mut self.config_changed)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
