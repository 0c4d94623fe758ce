use std::sync::{Arc, Mutex};

use crossterm::event::KeyEvent;
use serde_json::json;

use crate::config::Config;
use crate::container::ControllerContainer;
use crate::context::ControllerContext;
use crate::controller::{ControllerId, ControllerNode, EventFlow, HookId};
use crate::error::{RegistryError, Result};
use crate::factory::ControllerFactory;
use crate::logging::{LogLevel, event_with_fields, json_kv};
use crate::metrics::{MetricSnapshot, RegistryMetrics};
use crate::signals::{RegistryObserver, RegistrySignal, RenderTarget};

use super::RegistryConfig;

const LOG_TARGET: &str = "controller_registry::registry";
const CURRENT_KEY: &str = "Current";
const SAVED_KEY: &str = "Saved";
const CLASS_KEY: &str = "Class";

/// How a new current controller picks up state from the one it replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// `transition_from`: variant-specific hand-off between same-meaning controllers.
    Transition,
    /// `mimic`: adopt equivalent state across a class change.
    Mimic,
}

impl InstallMode {
    fn as_str(&self) -> &'static str {
        match self {
            InstallMode::Transition => "transition",
            InstallMode::Mimic => "mimic",
        }
    }
}

/// Non-owning alias to the current controller.
///
/// Holds only an id. The registry clears it through a destroy hook on the
/// current node, so it never names a controller that no longer exists, even
/// after the registry itself is dropped.
#[derive(Debug, Clone, Default)]
pub struct CurrentAlias {
    inner: Arc<Mutex<Option<ControllerId>>>,
}

impl CurrentAlias {
    pub fn get(&self) -> Option<ControllerId> {
        self.inner.lock().map(|guard| *guard).unwrap_or(None)
    }

    fn set(&self, id: ControllerId) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = Some(id);
        }
    }

    fn clear_if(&self, id: ControllerId) {
        if let Ok(mut guard) = self.inner.lock() {
            if *guard == Some(id) {
                *guard = None;
            }
        }
    }
}

/// Persisted entry that `load` could not restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// `Current` or `Saved[<index>]`.
    pub location: String,
    pub class_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub current_installed: bool,
    pub saved_loaded: usize,
    pub skipped: Vec<SkippedEntry>,
}

impl LoadReport {
    fn skip(&mut self, location: impl Into<String>, class_id: Option<&str>, reason: impl Into<String>) {
        self.skipped.push(SkippedEntry {
            location: location.into(),
            class_id: class_id.map(str::to_string),
            reason: reason.into(),
        });
    }
}

/// Owns every controller, designates one of them as current, and persists the set.
///
/// Saved controllers are addressed by saved index (`0` is the first saved
/// controller, not the current one).
pub struct ControllerRegistry {
    factory: ControllerFactory,
    context: ControllerContext,
    config: RegistryConfig,
    container: ControllerContainer,
    current: CurrentAlias,
    current_hook: Option<HookId>,
    render_target: Option<Box<dyn RenderTarget>>,
    observers: Vec<Arc<dyn RegistryObserver>>,
}

impl ControllerRegistry {
    pub fn new(factory: ControllerFactory, context: ControllerContext, config: RegistryConfig) -> Self {
        Self {
            factory,
            context,
            config,
            container: ControllerContainer::new(),
            current: CurrentAlias::default(),
            current_hook: None,
            render_target: None,
            observers: Vec::new(),
        }
    }

    /// Registry over the built-in controllers with default settings.
    pub fn with_builtin() -> Self {
        Self::new(
            ControllerFactory::with_builtin(),
            ControllerContext::new(),
            RegistryConfig::default(),
        )
    }

    pub fn factory(&self) -> &ControllerFactory {
        &self.factory
    }

    pub fn context(&self) -> &ControllerContext {
        &self.context
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn container(&self) -> &ControllerContainer {
        &self.container
    }

    pub fn subscribe(&mut self, observer: Arc<dyn RegistryObserver>) {
        self.observers.push(observer);
    }

    pub fn set_render_target(&mut self, target: Option<Box<dyn RenderTarget>>) {
        self.render_target = target;
    }

    /// Install a controller of the default class. There is no previous
    /// controller to hand off from.
    pub fn initialize(&mut self) -> Result<()> {
        let class_id = self.config.default_class.clone();
        let node = self.create(&class_id)?;
        self.install(node, InstallMode::Transition);
        Ok(())
    }

    /// Advance the current controller by one tick.
    pub fn update(&mut self, wall_dt: f32, ros_dt: f32) {
        let Some(current) = self.get_current_mut() else {
            return;
        };
        current.update(wall_dt, ros_dt);
        let changed = current.take_config_changed();
        self.with_metrics(RegistryMetrics::record_update);
        if changed {
            self.emit(RegistrySignal::ConfigChanged);
        }
    }

    /// Forward a key press to the current controller.
    pub fn handle_key(&mut self, key: &KeyEvent) -> EventFlow {
        let Some(current) = self.get_current_mut() else {
            return EventFlow::Continue;
        };
        let flow = current.handle_key(key);
        if current.take_config_changed() {
            self.emit(RegistrySignal::ConfigChanged);
        }
        flow
    }

    /// Build and initialize a controller without registering it.
    pub fn create(&self, class_id: &str) -> Result<ControllerNode> {
        let created = self
            .factory
            .make(class_id)
            .map_err(RegistryError::from)
            .and_then(|mut node| {
                node.initialize(&self.context)
                    .map_err(|err| RegistryError::CreationFailed {
                        class_id: class_id.to_string(),
                        reason: err.to_string(),
                    })?;
                Ok(node)
            });

        if let Err(err) = &created {
            self.with_metrics(RegistryMetrics::record_creation_failure);
            self.log(
                LogLevel::Warn,
                "creation_failed",
                [
                    json_kv("class_id", class_id),
                    json_kv("error", err.to_string()),
                ],
            );
        }
        created
    }

    /// Independent copy of `source`: saved into an empty config, then loaded
    /// into a fresh instance of the same class.
    pub fn copy(&self, source: &ControllerNode) -> Result<ControllerNode> {
        let mut config = Config::new();
        source.save(&mut config);

        let mut copy = self.create(source.class_id())?;
        copy.load(&config)?;
        self.with_metrics(RegistryMetrics::record_copy);
        Ok(copy)
    }

    pub fn get_current(&self) -> Option<&ControllerNode> {
        let id = self.current.get()?;
        self.container.front().filter(|node| node.id() == id)
    }

    pub fn get_current_mut(&mut self) -> Option<&mut ControllerNode> {
        let id = self.current.get()?;
        self.container.front_mut().filter(|node| node.id() == id)
    }

    pub fn current_alias(&self) -> CurrentAlias {
        self.current.clone()
    }

    /// Make a copy of the owned controller `source` current.
    ///
    /// Returns `Ok(false)` without side effects when `source` is `None`,
    /// unknown, or already current. The source controller stays where it was.
    pub fn set_current_from(&mut self, source: Option<ControllerId>) -> Result<bool> {
        let Some(id) = source else {
            return Ok(false);
        };
        if self.current.get() == Some(id) {
            return Ok(false);
        }
        let copy = match self.find(id) {
            Some(node) => self.copy(node)?,
            None => return Ok(false),
        };
        self.promote(copy);
        Ok(true)
    }

    /// Make a copy of a controller owned by the caller current.
    pub fn set_current_from_node(&mut self, source: &ControllerNode) -> Result<bool> {
        if self.current.get() == Some(source.id()) {
            return Ok(false);
        }
        let copy = self.copy(source)?;
        self.promote(copy);
        Ok(true)
    }

    /// Replace the current controller with a fresh one of `class_id` that
    /// mimics the previous one. On creation failure the previous controller
    /// stays installed.
    pub fn set_current_controller_type(&mut self, class_id: &str) -> Result<()> {
        let node = self.create(class_id)?;
        self.install(node, InstallMode::Mimic);
        self.emit(RegistrySignal::ConfigChanged);
        Ok(())
    }

    /// Append a copy of the current controller to the saved list.
    pub fn copy_current_to_saved_list(&mut self) -> Result<Option<ControllerId>> {
        let Some(current) = self.get_current() else {
            return Ok(None);
        };
        let mut copy = self.copy(current)?;
        copy.set_name(self.factory.class_name(copy.class_id()));
        let id = copy.id();
        self.log(
            LogLevel::Debug,
            "current_copied",
            [
                json_kv("class_id", copy.class_id()),
                json_kv("saved_index", self.count()),
            ],
        );
        self.container.push_child(copy);
        Ok(Some(id))
    }

    pub fn get_at(&self, index: usize) -> Option<&ControllerNode> {
        self.container.child_at(index.checked_add(1)?)
    }

    pub fn get_at_mut(&mut self, index: usize) -> Option<&mut ControllerNode> {
        self.container.child_at_mut(index.checked_add(1)?)
    }

    /// Number of saved controllers; the current one is not counted.
    pub fn count(&self) -> usize {
        self.container.num_children() - usize::from(self.container.has_front())
    }

    pub fn iter_saved(&self) -> impl Iterator<Item = &ControllerNode> {
        self.container.saved()
    }

    /// Look up an owned controller, current or saved.
    pub fn find(&self, id: ControllerId) -> Option<&ControllerNode> {
        self.container
            .index_of(id)
            .and_then(|index| self.container.child_at(index))
    }

    /// Insert into the saved list; `None` appends, indices past the end append.
    pub fn add(&mut self, mut node: ControllerNode, index: Option<usize>) {
        node.deactivate();
        match index {
            None => self.container.push_child(node),
            Some(index) => self.container.add_child(node, index.saturating_add(1)),
        }
    }

    /// Hand ownership of a saved controller back to the caller.
    pub fn take(&mut self, id: ControllerId) -> Option<ControllerNode> {
        let index = (0..self.count()).find(|&i| self.get_at(i).map(ControllerNode::id) == Some(id))?;
        self.take_at(index)
    }

    pub fn take_at(&mut self, index: usize) -> Option<ControllerNode> {
        self.container.take_child_at(index.checked_add(1)?)
    }

    /// Destroy every controller, the current one included.
    pub fn clear(&mut self) {
        let had_current = self.get_current().is_some();
        self.current_hook = None;
        self.container.clear();
        if had_current {
            self.emit(RegistrySignal::CurrentChanged);
        }
    }

    /// Restore the current controller and replace the saved list from `config`.
    ///
    /// Entries without a `Class`, of an unknown class, or rejected by their
    /// controller are skipped and reported. A `Current` entry that cannot be
    /// restored leaves the existing current controller in place.
    pub fn load(&mut self, config: &Config) -> LoadReport {
        let mut report = LoadReport::default();

        if let Some(current_config) = config.map_get_child(CURRENT_KEY) {
            match current_config.map_get_string(CLASS_KEY) {
                Some(class_id) => match self.restore(class_id, current_config) {
                    Ok(node) => {
                        self.install(node, InstallMode::Transition);
                        report.current_installed = true;
                    }
                    Err(err) => report.skip(CURRENT_KEY, Some(class_id), err.to_string()),
                },
                None => report.skip(CURRENT_KEY, None, "missing `Class`"),
            }
        }

        self.container.remove_children(1);
        if let Some(saved_config) = config.map_get_child(SAVED_KEY) {
            for (index, entry) in saved_config.list_iter().enumerate() {
                let location = format!("{SAVED_KEY}[{index}]");
                let Some(class_id) = entry.map_get_string(CLASS_KEY) else {
                    report.skip(location, None, "missing `Class`");
                    continue;
                };
                match self.restore(class_id, entry) {
                    Ok(node) => {
                        self.add(node, None);
                        report.saved_loaded += 1;
                    }
                    Err(err) => report.skip(location, Some(class_id), err.to_string()),
                }
            }
        }

        for skipped in &report.skipped {
            self.log(
                LogLevel::Warn,
                "load_entry_skipped",
                [
                    json_kv("location", skipped.location.as_str()),
                    json_kv("class_id", json!(skipped.class_id)),
                    json_kv("reason", skipped.reason.as_str()),
                ],
            );
        }
        self.log(
            LogLevel::Info,
            "config_loaded",
            [
                json_kv("current_installed", report.current_installed),
                json_kv("saved", report.saved_loaded),
                json_kv("skipped", report.skipped.len()),
            ],
        );
        let skipped = report.skipped.len();
        self.with_metrics(|metrics| metrics.record_load(skipped));
        report
    }

    pub fn load_json(&mut self, text: &str) -> Result<LoadReport> {
        let config = Config::from_json_str(text)?;
        if !config.is_map() && !config.is_empty() {
            return Err(RegistryError::InvalidConfig(
                "registry config must be a map".to_string(),
            ));
        }
        Ok(self.load(&config))
    }

    /// Write the current controller under `Current` and every saved
    /// controller, in order, under `Saved`. Without a current controller any
    /// existing `Current` entry is removed.
    pub fn save(&self, config: &mut Config) {
        match self.get_current() {
            Some(current) => current.save(config.map_make_child(CURRENT_KEY)),
            None => {
                config.map_remove(CURRENT_KEY);
            }
        }
        let saved_config = config.map_make_child(SAVED_KEY);
        *saved_config = Config::List(Vec::new());
        for node in self.iter_saved() {
            node.save(saved_config.list_append_new());
        }
    }

    pub fn save_json(&self) -> Result<String> {
        let mut config = Config::new();
        self.save(&mut config);
        config.to_json_pretty()
    }

    /// Digest of everything `save` would write.
    pub fn state_digest(&self) -> blake3::Hash {
        let mut config = Config::new();
        self.save(&mut config);
        config.digest()
    }

    pub fn metrics_snapshot(&self) -> Option<MetricSnapshot> {
        let metrics = self.config.metrics.as_ref()?;
        metrics.lock().ok().map(|guard| guard.snapshot())
    }

    /// Emit a metrics snapshot through the configured logger.
    pub fn log_metrics(&self) {
        if let (Some(logger), Some(snapshot)) = (self.config.logger.as_ref(), self.metrics_snapshot()) {
            let _ = logger.log_event(snapshot.to_log_event(&self.config.metrics_target));
        }
    }

    fn restore(&self, class_id: &str, config: &Config) -> Result<ControllerNode> {
        let mut node = self.create(class_id)?;
        node.load(config)?;
        Ok(node)
    }

    fn promote(&mut self, copy: ControllerNode) {
        self.install(copy, InstallMode::Transition);
        self.emit(RegistrySignal::ConfigChanged);
    }

    fn install(&mut self, mut new_current: ControllerNode, mode: InstallMode) {
        let mut previous = self.container.take_front();
        if let Some(prev) = previous.as_mut() {
            match mode {
                InstallMode::Mimic => new_current.controller_mut().mimic(prev.controller()),
                InstallMode::Transition => new_current
                    .controller_mut()
                    .transition_from(prev.controller()),
            }
            if let Some(hook) = self.current_hook.take() {
                prev.detach_destroy_hook(hook);
            }
            prev.deactivate();
        }

        new_current.set_name(self.config.current_name.clone());
        new_current.activate();
        let alias = self.current.clone();
        self.current_hook = Some(new_current.attach_destroy_hook(move |id| alias.clear_if(id)));
        self.current.set(new_current.id());

        let fields = [
            json_kv("class_id", new_current.class_id()),
            json_kv("mode", mode.as_str()),
            json_kv(
                "previous",
                json!(previous.as_ref().map(|node| node.class_id().to_string())),
            ),
        ];
        self.container.add_child_to_front(new_current);
        drop(previous);

        if let (Some(target), Some(current)) = (self.render_target.as_mut(), self.container.front()) {
            target.on_controller_changed(current);
        }

        self.log(LogLevel::Info, "current_installed", fields);
        self.with_metrics(|metrics| metrics.record_install(mode == InstallMode::Mimic));
        self.emit(RegistrySignal::CurrentChanged);
    }

    fn emit(&self, signal: RegistrySignal) {
        for observer in &self.observers {
            observer.on_signal(signal);
        }
    }

    fn with_metrics(&self, record: impl FnOnce(&mut RegistryMetrics)) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                record(&mut *guard);
            }
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.config.logger.as_ref() {
            let event = event_with_fields(level, LOG_TARGET, message, fields);
            let _ = logger.log_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Controller, StereoSettings};
    use crate::controllers::{FirstPersonController, OrbitController};
    use crate::logging::{Logger, MemorySink};
    use crate::signals::SignalLog;
    use crossterm::event::{KeyCode, KeyModifiers};
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry_with_log() -> (ControllerRegistry, Arc<SignalLog>) {
        let mut registry = ControllerRegistry::with_builtin();
        let log = Arc::new(SignalLog::new());
        registry.subscribe(log.clone());
        (registry, log)
    }

    fn orbit(registry: &ControllerRegistry) -> &OrbitController {
        registry
            .get_current()
            .and_then(|node| node.downcast_ref::<OrbitController>())
            .expect("orbit current")
    }

    fn saved_classes(registry: &ControllerRegistry) -> Vec<String> {
        registry
            .iter_saved()
            .map(|node| node.class_id().to_string())
            .collect()
    }

    #[derive(Default)]
    struct Counters {
        drops: AtomicUsize,
        transitions: AtomicUsize,
        mimics: AtomicUsize,
    }

    impl Counters {
        fn get(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    struct Tracked {
        counters: Arc<Counters>,
    }

    impl Controller for Tracked {
        fn reset(&mut self) {}

        fn load(&mut self, _config: &Config) -> Result<()> {
            Ok(())
        }

        fn save(&self, _config: &mut Config) {}

        fn mimic(&mut self, _previous: &dyn Controller) {
            self.counters.mimics.fetch_add(1, Ordering::SeqCst);
        }

        fn transition_from(&mut self, _previous: &dyn Controller) {
            self.counters.transitions.fetch_add(1, Ordering::SeqCst);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.counters.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracked_registry() -> (ControllerRegistry, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let mut factory = ControllerFactory::new();
        let shared = counters.clone();
        factory.register("Tracked", "Tracked", move || {
            Box::new(Tracked {
                counters: shared.clone(),
            })
        });
        let config = RegistryConfig::default().with_default_class("Tracked");
        let registry = ControllerRegistry::new(factory, ControllerContext::new(), config);
        (registry, counters)
    }

    #[test]
    fn initialize_installs_default_class() {
        let (mut registry, log) = registry_with_log();
        assert!(registry.get_current().is_none());
        registry.initialize().unwrap();

        let current = registry.get_current().unwrap();
        assert_eq!(current.class_id(), "Orbit");
        assert_eq!(current.name(), "Current View");
        assert!(current.is_active());
        assert_eq!(registry.count(), 0);
        assert_eq!(log.take(), vec![RegistrySignal::CurrentChanged]);
    }

    #[test]
    fn update_without_current_is_noop() {
        let (mut registry, log) = registry_with_log();
        registry.update(0.016, 0.016);
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn copy_to_saved_list_is_independent() {
        let (mut registry, _log) = registry_with_log();
        registry.initialize().unwrap();
        registry
            .get_current_mut()
            .and_then(|node| node.downcast_mut::<OrbitController>())
            .unwrap()
            .set_distance(10.0);

        registry.copy_current_to_saved_list().unwrap();
        assert_eq!(registry.count(), 1);
        let saved = registry.get_at(0).unwrap();
        assert_eq!(saved.class_id(), "Orbit");
        assert_eq!(saved.name(), "Orbit");
        assert!(!saved.is_active());

        registry
            .get_current_mut()
            .and_then(|node| node.downcast_mut::<OrbitController>())
            .unwrap()
            .set_distance(25.0);

        let copy = registry
            .get_at(0)
            .and_then(|node| node.downcast_ref::<OrbitController>())
            .unwrap();
        assert_eq!(copy.distance(), 10.0);
        assert_eq!(orbit(&registry).distance(), 25.0);

        let mut persisted = Config::new();
        registry.get_at(0).unwrap().save(&mut persisted);
        assert_eq!(persisted.map_get_float("distance"), Some(10.0));
    }

    #[test]
    fn copy_without_current_does_nothing() {
        let (mut registry, _log) = registry_with_log();
        assert_eq!(registry.copy_current_to_saved_list().unwrap(), None);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn set_current_type_mimics_previous() {
        let (mut registry, log) = registry_with_log();
        registry.initialize().unwrap();
        log.take();
        let eye = orbit(&registry).eye();

        registry.set_current_controller_type("FirstPerson").unwrap();
        let current = registry.get_current().unwrap();
        assert_eq!(current.class_id(), "FirstPerson");
        let camera = current.downcast_ref::<FirstPersonController>().unwrap();
        assert_eq!(camera.position(), eye);

        assert_eq!(log.count(RegistrySignal::CurrentChanged), 1);
        assert_eq!(log.count(RegistrySignal::ConfigChanged), 1);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn unknown_type_keeps_previous_current() {
        let (mut registry, log) = registry_with_log();
        registry.initialize().unwrap();
        let before = registry.get_current().unwrap().id();
        log.take();

        let err = registry.set_current_controller_type("Missing").unwrap_err();
        match err {
            RegistryError::CreationFailed { class_id, .. } => assert_eq!(class_id, "Missing"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.get_current().unwrap().id(), before);
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn set_current_from_current_is_noop() {
        let (mut registry, counters) = tracked_registry();
        let log = Arc::new(SignalLog::new());
        registry.subscribe(log.clone());
        registry.initialize().unwrap();
        log.take();

        let current_id = registry.get_current().map(ControllerNode::id);
        assert!(!registry.set_current_from(current_id).unwrap());
        assert!(!registry.set_current_from(None).unwrap());
        assert!(log.snapshot().is_empty());
        assert_eq!(Counters::get(&counters.drops), 0);
        assert_eq!(registry.get_current().map(ControllerNode::id), current_id);
    }

    #[test]
    fn set_current_from_saved_copies_and_transitions() {
        let (mut registry, counters) = tracked_registry();
        let log = Arc::new(SignalLog::new());
        registry.subscribe(log.clone());
        registry.initialize().unwrap();
        let saved_id = registry.copy_current_to_saved_list().unwrap();
        let old_current = registry.get_current().unwrap().id();
        log.take();

        assert!(registry.set_current_from(saved_id).unwrap());
        let current = registry.get_current().unwrap();
        assert_ne!(current.id(), old_current);
        assert_ne!(Some(current.id()), saved_id);
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get_at(0).map(ControllerNode::id), saved_id);
        assert_eq!(Counters::get(&counters.transitions), 1);
        assert_eq!(Counters::get(&counters.drops), 1);
        assert_eq!(
            log.take(),
            vec![RegistrySignal::CurrentChanged, RegistrySignal::ConfigChanged]
        );
    }

    #[test]
    fn set_current_from_external_node() {
        let (mut registry, _log) = registry_with_log();
        registry.initialize().unwrap();
        let mut external = registry.create("FirstPerson").unwrap();
        external
            .downcast_mut::<FirstPersonController>()
            .unwrap()
            .set_speed(4.0);

        assert!(registry.set_current_from_node(&external).unwrap());
        let current = registry.get_current().unwrap();
        assert_ne!(current.id(), external.id());
        assert_eq!(
            current.downcast_ref::<FirstPersonController>().unwrap().speed(),
            4.0
        );
    }

    #[test]
    fn add_and_take_leave_current_alone() {
        let (mut registry, _log) = registry_with_log();
        registry.initialize().unwrap();
        let current_id = registry.get_current().unwrap().id();

        let a = registry.create("Orbit").unwrap();
        let b = registry.create("FirstPerson").unwrap();
        let c = registry.create("FirstPerson").unwrap();
        let (a_id, b_id) = (a.id(), b.id());
        registry.add(a, None);
        registry.add(b, Some(0));
        registry.add(c, Some(99));
        assert_eq!(registry.count(), 3);
        assert_eq!(registry.get_at(0).unwrap().id(), b_id);
        assert_eq!(registry.get_at(1).unwrap().id(), a_id);

        assert!(registry.take(current_id).is_none());
        let taken = registry.take(a_id).unwrap();
        assert_eq!(taken.id(), a_id);
        assert_eq!(registry.count(), 2);
        assert!(registry.take_at(5).is_none());
        assert!(registry.take_at(usize::MAX).is_none());
        assert_eq!(registry.take_at(0).unwrap().id(), b_id);
        assert_eq!(registry.count(), 1);
        assert!(registry.get_at(1).is_none());
        assert_eq!(registry.get_current().unwrap().id(), current_id);
    }

    #[test]
    fn count_without_current_counts_every_saved() {
        let (mut registry, _log) = registry_with_log();
        let node = registry.create("Orbit").unwrap();
        registry.add(node, Some(0));
        assert!(registry.get_current().is_none());
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get_at(0).unwrap().class_id(), "Orbit");
    }

    #[test]
    fn load_restores_current_and_saved() {
        let (mut registry, _log) = registry_with_log();
        let report = registry
            .load_json(
                r#"{"Current": {"Class": "Orbit", "distance": 5},
                    "Saved": [{"Class": "FirstPerson", "speed": 2}]}"#,
            )
            .unwrap();

        assert!(report.current_installed);
        assert_eq!(report.saved_loaded, 1);
        assert!(report.skipped.is_empty());
        assert_eq!(registry.get_current().unwrap().class_id(), "Orbit");
        assert_eq!(orbit(&registry).distance(), 5.0);
        assert_eq!(registry.count(), 1);
        let saved = registry.get_at(0).unwrap();
        assert_eq!(saved.class_id(), "FirstPerson");
        assert_eq!(
            saved.downcast_ref::<FirstPersonController>().unwrap().speed(),
            2.0
        );
    }

    #[test]
    fn load_skips_malformed_entries() {
        let (mut registry, _log) = registry_with_log();
        registry.initialize().unwrap();
        let before = registry.get_current().unwrap().id();
        registry.copy_current_to_saved_list().unwrap();

        let report = registry
            .load_json(
                r#"{"Current": {"distance": 3},
                    "Saved": [{"speed": 1}, {"Class": "Missing"}, {"Class": "Orbit", "distance": 7}]}"#,
            )
            .unwrap();

        assert!(!report.current_installed);
        assert_eq!(report.saved_loaded, 1);
        let locations: Vec<_> = report
            .skipped
            .iter()
            .map(|entry| entry.location.as_str())
            .collect();
        assert_eq!(locations, vec!["Current", "Saved[0]", "Saved[1]"]);
        assert_eq!(report.skipped[2].class_id.as_deref(), Some("Missing"));

        assert_eq!(registry.get_current().unwrap().id(), before);
        assert_eq!(saved_classes(&registry), vec!["Orbit"]);
    }

    #[test]
    fn save_then_load_round_trips() {
        let (mut registry, _log) = registry_with_log();
        registry.initialize().unwrap();
        registry
            .get_current_mut()
            .and_then(|node| node.downcast_mut::<OrbitController>())
            .unwrap()
            .set_focal_point([1.0, 2.0, 3.0]);
        registry.copy_current_to_saved_list().unwrap();
        let mut camera = registry.create("FirstPerson").unwrap();
        camera.set_name("Walkthrough");
        camera.set_stereo(StereoSettings {
            enable: false,
            ..StereoSettings::default()
        });
        camera
            .downcast_mut::<FirstPersonController>()
            .unwrap()
            .set_speed(3.5);
        registry.add(camera, None);

        let text = registry.save_json().unwrap();
        let mut restored = ControllerRegistry::with_builtin();
        let report = restored.load_json(&text).unwrap();
        assert!(report.skipped.is_empty());

        assert_eq!(restored.get_current().unwrap().class_id(), "Orbit");
        assert_eq!(saved_classes(&restored), saved_classes(&registry));
        assert_eq!(restored.get_at(1).unwrap().name(), "Walkthrough");
        assert!(!restored.get_at(1).unwrap().stereo().enable);
        assert_eq!(orbit(&restored).focal_point(), [1.0, 2.0, 3.0]);
        assert_eq!(restored.state_digest(), registry.state_digest());
    }

    #[test]
    fn state_digest_changes_with_fields() {
        let (mut registry, _log) = registry_with_log();
        registry.initialize().unwrap();
        let before = registry.state_digest();
        registry
            .get_current_mut()
            .and_then(|node| node.downcast_mut::<OrbitController>())
            .unwrap()
            .set_distance(2.0);
        assert_ne!(registry.state_digest(), before);
    }

    #[test]
    fn alias_cleared_when_registry_dropped() {
        let (mut registry, _log) = registry_with_log();
        registry.initialize().unwrap();
        let alias = registry.current_alias();
        assert!(alias.get().is_some());
        drop(registry);
        assert!(alias.get().is_none());
    }

    #[test]
    fn clear_destroys_current_and_saved() {
        let (mut registry, log) = registry_with_log();
        registry.initialize().unwrap();
        registry.copy_current_to_saved_list().unwrap();
        let alias = registry.current_alias();
        log.take();

        registry.clear();
        assert!(alias.get().is_none());
        assert!(registry.get_current().is_none());
        assert_eq!(registry.count(), 0);
        assert_eq!(log.take(), vec![RegistrySignal::CurrentChanged]);
    }

    #[test]
    fn replaced_current_is_destroyed_without_clearing_alias() {
        let (mut registry, counters) = tracked_registry();
        registry.initialize().unwrap();
        registry.set_current_controller_type("Tracked").unwrap();
        assert_eq!(Counters::get(&counters.drops), 1);
        assert_eq!(Counters::get(&counters.mimics), 1);
        let alias = registry.current_alias();
        assert_eq!(alias.get(), registry.get_current().map(ControllerNode::id));
    }

    #[test]
    fn load_over_existing_current_transitions_and_replaces_saved() {
        let (mut registry, counters) = tracked_registry();
        let log = Arc::new(SignalLog::new());
        registry.subscribe(log.clone());
        registry.initialize().unwrap();
        let old_current = registry.get_current().unwrap().id();
        let old_saved: Vec<_> = (0..2)
            .filter_map(|_| registry.copy_current_to_saved_list().unwrap())
            .collect();
        log.take();

        let report = registry
            .load_json(r#"{"Current": {"Class": "Tracked"}, "Saved": [{"Class": "Tracked"}]}"#)
            .unwrap();

        assert!(report.current_installed);
        assert_eq!(report.saved_loaded, 1);
        assert_ne!(registry.get_current().unwrap().id(), old_current);
        assert!(registry.find(old_current).is_none());
        assert_eq!(registry.count(), 1);
        for id in &old_saved {
            assert!(registry.find(*id).is_none());
        }
        // previous current plus both old saved controllers
        assert_eq!(Counters::get(&counters.drops), 3);
        assert_eq!(Counters::get(&counters.transitions), 1);
        assert_eq!(Counters::get(&counters.mimics), 0);
        assert_eq!(log.take(), vec![RegistrySignal::CurrentChanged]);
    }

    #[test]
    fn save_without_current_drops_stale_current_entry() {
        let (mut registry, _log) = registry_with_log();
        registry.initialize().unwrap();
        let mut config = Config::new();
        registry.save(&mut config);
        assert!(config.map_get_child("Current").is_some());

        registry.clear();
        registry.save(&mut config);
        assert!(config.map_get_child("Current").is_none());
        assert_eq!(config.map_get_child("Saved").map(Config::list_length), Some(0));

        let mut restored = ControllerRegistry::with_builtin();
        let report = restored.load(&config);
        assert!(!report.current_installed);
        assert!(restored.get_current().is_none());
    }

    #[test]
    fn saved_controllers_are_never_active() {
        let (mut registry, _log) = registry_with_log();
        registry.initialize().unwrap();
        registry.copy_current_to_saved_list().unwrap();
        let saved_id = registry.get_at(0).map(ControllerNode::id);
        registry.set_current_from(saved_id).unwrap();
        let first_current = registry.get_current().unwrap().id();
        registry.set_current_controller_type("FirstPerson").unwrap();
        registry.copy_current_to_saved_list().unwrap();

        let mut demoted = registry.create("Orbit").unwrap();
        demoted.activate();
        registry.add(demoted, Some(0));

        assert!(registry.find(first_current).is_none());
        assert_eq!(registry.count(), 3);
        assert!(registry.iter_saved().all(|node| !node.is_active()));
        assert!(registry.get_current().unwrap().is_active());
    }

    #[test]
    fn load_json_rejects_non_map_root() {
        let (mut registry, _log) = registry_with_log();
        registry.initialize().unwrap();
        let err = registry.load_json("[1, 2]").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig(_)));
        assert!(registry.get_current().is_some());
    }

    #[test]
    fn key_changes_raise_config_changed() {
        let (mut registry, log) = registry_with_log();
        registry.initialize().unwrap();
        log.take();

        let flow = registry.handle_key(&KeyEvent::new(KeyCode::Left, KeyModifiers::NONE));
        assert_eq!(flow, EventFlow::Consumed);
        assert_eq!(log.take(), vec![RegistrySignal::ConfigChanged]);

        let flow = registry.handle_key(&KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE));
        assert_eq!(flow, EventFlow::Continue);
        assert!(log.take().is_empty());
    }

    #[test]
    fn render_target_sees_new_current() {
        struct Recorder(Arc<Mutex<Vec<String>>>);

        impl RenderTarget for Recorder {
            fn on_controller_changed(&mut self, controller: &ControllerNode) {
                self.0.lock().unwrap().push(controller.class_id().to_string());
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (mut registry, _log) = registry_with_log();
        registry.set_render_target(Some(Box::new(Recorder(seen.clone()))));
        registry.initialize().unwrap();
        registry.set_current_controller_type("FirstPerson").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["Orbit", "FirstPerson"]);
    }

    struct SceneScale(f32);

    struct Scaled {
        scale: f32,
    }

    impl Controller for Scaled {
        fn on_initialize(&mut self, ctx: &ControllerContext) -> Result<()> {
            let scale = ctx
                .resource::<SceneScale>()
                .ok_or_else(|| RegistryError::InvalidConfig("scene scale not provided".into()))?;
            self.scale = scale.0;
            Ok(())
        }

        fn reset(&mut self) {}

        fn load(&mut self, _config: &Config) -> Result<()> {
            Ok(())
        }

        fn save(&self, config: &mut Config) {
            config.map_set_value("scale", self.scale);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn initialization_reads_context_resources() {
        let mut factory = ControllerFactory::new();
        factory.register("Scaled", "Scaled", || Box::new(Scaled { scale: 0.0 }));
        let context = ControllerContext::new();
        let registry = ControllerRegistry::new(factory, context.clone(), RegistryConfig::default());

        let err = registry.create("Scaled").unwrap_err();
        assert!(matches!(err, RegistryError::CreationFailed { .. }));

        context.provide(SceneScale(2.0)).unwrap();
        let node = registry.create("Scaled").unwrap();
        assert_eq!(node.downcast_ref::<Scaled>().unwrap().scale, 2.0);
    }

    #[test]
    fn logs_and_metrics_record_activity() {
        let sink = Arc::new(MemorySink::new());
        let mut config = RegistryConfig::default().with_logger(Logger::from_arc(sink.clone()));
        config.enable_metrics();
        let mut registry = ControllerRegistry::new(
            ControllerFactory::with_builtin(),
            ControllerContext::new(),
            config,
        );

        registry.initialize().unwrap();
        registry.set_current_controller_type("FirstPerson").unwrap();
        registry.copy_current_to_saved_list().unwrap();
        let _ = registry.set_current_controller_type("Missing");
        registry.update(0.1, 0.1);

        let snapshot = registry.metrics_snapshot().unwrap();
        assert_eq!(snapshot.installs, 2);
        assert_eq!(snapshot.mimics, 1);
        assert_eq!(snapshot.copies, 1);
        assert_eq!(snapshot.creation_failures, 1);
        assert_eq!(snapshot.updates, 1);

        let messages = sink.messages();
        assert!(messages.contains(&"current_installed".to_string()));
        assert!(messages.contains(&"creation_failed".to_string()));

        registry.log_metrics();
        assert_eq!(sink.messages().last().map(String::as_str), Some("registry_metrics"));
    }
}
