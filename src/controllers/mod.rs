//! Reference controller variants registered by [`ControllerFactory::with_builtin`](crate::ControllerFactory::with_builtin).

mod first_person;
mod orbit;

pub use first_person::FirstPersonController;
pub use orbit::OrbitController;

use std::f32::consts::FRAC_PI_2;

use crate::config::Config;

const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.001;

fn clamp_pitch(pitch: f32) -> f32 {
    pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT)
}

fn save_vec3(config: &mut Config, key: &str, value: [f32; 3]) {
    let child = config.map_make_child(key);
    child.map_set_value("x", value[0]);
    child.map_set_value("y", value[1]);
    child.map_set_value("z", value[2]);
}

/// Missing components keep the value already in `target`.
fn load_vec3(config: &Config, key: &str, target: &mut [f32; 3]) {
    if let Some(child) = config.map_get_child(key) {
        for (slot, axis) in target.iter_mut().zip(["x", "y", "z"]) {
            if let Some(value) = child.map_get_float(axis) {
                *slot = value;
            }
        }
    }
}

fn offset(origin: [f32; 3], direction: [f32; 3], scale: f32) -> [f32; 3] {
    [
        origin[0] + direction[0] * scale,
        origin[1] + direction[1] * scale,
        origin[2] + direction[2] * scale,
    ]
}
