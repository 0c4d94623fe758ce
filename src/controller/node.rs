use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossterm::event::KeyEvent;

use crate::config::Config;
use crate::context::ControllerContext;
use crate::error::{RegistryError, Result};
use crate::logging::{LogLevel, event_with_fields, json_kv};

use super::{Controller, EventFlow};

const LOG_TARGET: &str = "controller_registry::controller";

static NEXT_CONTROLLER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a controller instance. Copies get fresh ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControllerId(u64);

impl ControllerId {
    fn next() -> Self {
        Self(NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "controller#{}", self.0)
    }
}

/// Handle returned by [`ControllerNode::attach_destroy_hook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

type DestroyHook = Box<dyn FnOnce(ControllerId) + Send>;

/// Stereo rendering properties shared by every controller variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoSettings {
    pub enable: bool,
    pub swap_eyes: bool,
    pub eye_separation: f32,
    pub focal_distance: f32,
}

impl Default for StereoSettings {
    fn default() -> Self {
        Self {
            enable: true,
            swap_eyes: false,
            eye_separation: 0.06,
            focal_distance: 1.0,
        }
    }
}

impl StereoSettings {
    fn save(&self, config: &mut Config) {
        config.map_set_value("Enable", self.enable);
        config.map_set_value("Swap Eyes", self.swap_eyes);
        config.map_set_value("Eye Separation", self.eye_separation);
        config.map_set_value("Focal Distance", self.focal_distance);
    }

    fn load(&mut self, config: &Config) {
        if let Some(enable) = config.map_get_bool("Enable") {
            self.enable = enable;
        }
        if let Some(swap) = config.map_get_bool("Swap Eyes") {
            self.swap_eyes = swap;
        }
        if let Some(separation) = config.map_get_float("Eye Separation") {
            self.eye_separation = separation;
        }
        if let Some(focal) = config.map_get_float("Focal Distance") {
            self.focal_distance = focal;
        }
    }
}

const DEFAULT_NEAR_CLIP: f32 = 0.01;

/// A controller variant together with the identity and properties every
/// variant carries.
///
/// Dropping a node runs its destroy hooks synchronously, in attach order,
/// before the variant itself is released.
pub struct ControllerNode {
    id: ControllerId,
    class_id: String,
    name: String,
    active: bool,
    near_clip_distance: f32,
    stereo: StereoSettings,
    inner: Box<dyn Controller>,
    hooks: Vec<(HookId, DestroyHook)>,
    next_hook: u64,
}

impl ControllerNode {
    pub fn new(class_id: impl Into<String>, inner: Box<dyn Controller>) -> Self {
        let class_id = class_id.into();
        Self {
            id: ControllerId::next(),
            name: Self::format_class_id(&class_id),
            class_id,
            active: false,
            near_clip_distance: DEFAULT_NEAR_CLIP,
            stereo: StereoSettings::default(),
            inner,
            hooks: Vec::new(),
            next_hook: 0,
        }
    }

    /// Display form of a class id: the text after the last `/`.
    pub fn format_class_id(class_id: &str) -> String {
        class_id
            .rsplit_once('/')
            .map(|(_, tail)| tail)
            .unwrap_or(class_id)
            .to_string()
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn near_clip_distance(&self) -> f32 {
        self.near_clip_distance
    }

    pub fn set_near_clip_distance(&mut self, distance: f32) {
        self.near_clip_distance = distance.max(0.001);
    }

    pub fn stereo(&self) -> &StereoSettings {
        &self.stereo
    }

    pub fn set_stereo(&mut self, stereo: StereoSettings) {
        self.stereo = stereo;
    }

    pub fn controller(&self) -> &dyn Controller {
        self.inner.as_ref()
    }

    pub fn controller_mut(&mut self) -> &mut dyn Controller {
        self.inner.as_mut()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.inner.as_any_mut().downcast_mut::<T>()
    }

    pub fn initialize(&mut self, ctx: &ControllerContext) -> Result<()> {
        self.inner.on_initialize(ctx)?;
        if let Some(logger) = ctx.logger() {
            let event = event_with_fields(
                LogLevel::Debug,
                LOG_TARGET,
                "controller_initialized",
                [
                    json_kv("class_id", self.class_id.as_str()),
                    json_kv("id", self.id.raw()),
                ],
            );
            let _ = logger.log_event(event);
        }
        Ok(())
    }

    /// Only the registry flips this, while installing the node as current.
    pub(crate) fn activate(&mut self) {
        self.active = true;
        self.inner.on_activate();
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    pub fn update(&mut self, wall_dt: f32, ros_dt: f32) {
        self.inner.update(wall_dt, ros_dt);
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> EventFlow {
        self.inner.handle_key(key)
    }

    pub fn take_config_changed(&mut self) -> bool {
        self.inner.take_config_changed()
    }

    /// Write `Class`, `Name`, the shared properties and then the variant fields.
    pub fn save(&self, config: &mut Config) {
        config.map_set_value("Class", self.class_id.as_str());
        config.map_set_value("Name", self.name.as_str());
        config.map_set_value("Near Clip Distance", self.near_clip_distance);
        self.stereo.save(config.map_make_child("Stereo"));
        self.inner.save(config);
    }

    /// Read back what [`save`](Self::save) wrote. Missing shared properties keep
    /// their current values; a `Class` entry naming another class is rejected.
    pub fn load(&mut self, config: &Config) -> Result<()> {
        if let Some(class_id) = config.map_get_string("Class") {
            if class_id != self.class_id {
                return Err(RegistryError::load(
                    self.class_id.clone(),
                    format!("config belongs to class `{class_id}`"),
                ));
            }
        }
        if let Some(name) = config.map_get_string("Name") {
            self.name = name.to_string();
        }
        if let Some(distance) = config.map_get_float("Near Clip Distance") {
            self.set_near_clip_distance(distance);
        }
        if let Some(stereo) = config.map_get_child("Stereo") {
            self.stereo.load(stereo);
        }
        self.inner.load(config)
    }

    pub fn attach_destroy_hook<F>(&mut self, hook: F) -> HookId
    where
        F: FnOnce(ControllerId) + Send + 'static,
    {
        let id = HookId(self.next_hook);
        self.next_hook += 1;
        self.hooks.push((id, Box::new(hook)));
        id
    }

    /// Returns `false` if the hook was already detached.
    pub fn detach_destroy_hook(&mut self, hook: HookId) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|(id, _)| *id != hook);
        self.hooks.len() != before
    }
}

impl Drop for ControllerNode {
    fn drop(&mut self) {
        let id = self.id;
        for (_, hook) in self.hooks.drain(..) {
            hook(id);
        }
    }
}

impl fmt::Debug for ControllerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerNode")
            .field("id", &self.id)
            .field("class_id", &self.class_id)
            .field("name", &self.name)
            .field("active", &self.active)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
