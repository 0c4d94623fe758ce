use std::any::Any;
use std::f32::consts::FRAC_PI_4;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use crate::config::Config;
use crate::controller::{CameraPose, Controller, EventFlow};
use crate::error::Result;

use super::{clamp_pitch, load_vec3, offset, save_vec3};

const MIN_DISTANCE: f32 = 0.01;
const ROTATE_STEP: f32 = 0.1;
const ZOOM_FACTOR: f32 = 0.9;

/// Orbits a focal point at a fixed distance.
#[derive(Debug, Clone)]
pub struct OrbitController {
    distance: f32,
    yaw: f32,
    pitch: f32,
    focal_point: [f32; 3],
    config_changed: bool,
}

impl Default for OrbitController {
    fn default() -> Self {
        Self {
            distance: 10.0,
            yaw: FRAC_PI_4,
            pitch: FRAC_PI_4,
            focal_point: [0.0; 3],
            config_changed: false,
        }
    }
}

impl OrbitController {
    pub const CLASS_ID: &'static str = "Orbit";

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance.max(MIN_DISTANCE);
        self.config_changed = true;
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn focal_point(&self) -> [f32; 3] {
        self.focal_point
    }

    pub fn set_focal_point(&mut self, focal_point: [f32; 3]) {
        self.focal_point = focal_point;
        self.config_changed = true;
    }

    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch = clamp_pitch(self.pitch + delta_pitch);
        self.config_changed = true;
    }

    /// Eye position: back off from the focal point along the view direction.
    pub fn eye(&self) -> [f32; 3] {
        let forward = self.pose_direction();
        offset(self.focal_point, forward, -self.distance)
    }

    fn pose_direction(&self) -> [f32; 3] {
        CameraPose {
            position: self.focal_point,
            yaw: self.yaw,
            pitch: self.pitch,
        }
        .forward()
    }
}

impl Controller for OrbitController {
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
            KeyCode::Left => self.rotate(-ROTATE_STEP, 0.0),
            KeyCode::Right => self.rotate(ROTATE_STEP, 0.0),
            KeyCode::Up => self.rotate(0.0, ROTATE_STEP),
            KeyCode::Down => self.rotate(0.0, -ROTATE_STEP),
            KeyCode::Char('+') | KeyCode::Char('=') => self.set_distance(self.distance * ZOOM_FACTOR),
            KeyCode::Char('-') => self.set_distance(self.distance / ZOOM_FACTOR),
            _ => return EventFlow::Continue,
        }
        EventFlow::Consumed
    }

    fn load(&mut self, config: &Config) -> Result<()> {
        if let Some(distance) = config.map_get_float("distance") {
            self.distance = distance.max(MIN_DISTANCE);
        }
        if let Some(yaw) = config.map_get_float("yaw") {
            self.yaw = yaw;
        }
        if let Some(pitch) = config.map_get_float("pitch") {
            self.pitch = clamp_pitch(pitch);
        }
        load_vec3(config, "focal_point", &mut self.focal_point);
        Ok(())
    }

    fn save(&self, config: &mut Config) {
        config.map_set_value("distance", self.distance);
        config.map_set_value("yaw", self.yaw);
        config.map_set_value("pitch", self.pitch);
        save_vec3(config, "focal_point", self.focal_point);
    }

    /// Keeps the eye where `previous` had it and looks the same way, holding
    /// the current orbit distance.
    fn mimic(&mut self, previous: &dyn Controller) {
        let Some(pose) = previous.camera_pose() else {
            return;
        };
        self.yaw = pose.yaw;
        self.pitch = clamp_pitch(pose.pitch);
        self.focal_point = offset(pose.position, self.pose_direction(), self.distance);
        self.config_changed = true;
    }

    fn camera_pose(&self) -> Option<CameraPose> {
        Some(CameraPose {
            position: self.eye(),
            yaw: self.yaw,
            pitch: self.pitch,
        })
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
