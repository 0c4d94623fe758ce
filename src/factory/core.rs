use std::collections::BTreeMap;
use std::sync::Arc;

use crate::controller::{Controller, ControllerNode};
use crate::controllers::{FirstPersonController, OrbitController};
use crate::error::FactoryError;

/// Constructor registered for a class id. An `Err` carries a human-readable reason.
pub type ControllerConstructor =
    Arc<dyn Fn() -> Result<Box<dyn Controller>, String> + Send + Sync>;

#[derive(Clone)]
struct FactoryEntry {
    display_name: String,
    constructor: ControllerConstructor,
}

/// Maps class ids to constructors. The set of variants stays open: anything
/// implementing [`Controller`] can be registered under a new id.
#[derive(Clone, Default)]
pub struct ControllerFactory {
    entries: BTreeMap<String, FactoryEntry>,
}

impl ControllerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory preloaded with the orbit and first-person controllers.
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        factory.register(OrbitController::CLASS_ID, "Orbit", || {
            Box::new(OrbitController::default())
        });
        factory.register(FirstPersonController::CLASS_ID, "First Person", || {
            Box::new(FirstPersonController::default())
        });
        factory
    }

    pub fn register<F>(
        &mut self,
        class_id: impl Into<String>,
        display_name: impl Into<String>,
        constructor: F,
    ) where
        F: Fn() -> Box<dyn Controller> + Send + Sync + 'static,
    {
        self.register_fallible(class_id, display_name, move || Ok(constructor()));
    }

    pub fn register_fallible<F>(
        &mut self,
        class_id: impl Into<String>,
        display_name: impl Into<String>,
        constructor: F,
    ) where
        F: Fn() -> Result<Box<dyn Controller>, String> + Send + Sync + 'static,
    {
        self.entries.insert(
            class_id.into(),
            FactoryEntry {
                display_name: display_name.into(),
                constructor: Arc::new(constructor),
            },
        );
    }

    pub fn contains(&self, class_id: &str) -> bool {
        self.entries.contains_key(class_id)
    }

    pub fn class_ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Registered display name, or the formatted class id for unknown classes.
    pub fn class_name(&self, class_id: &str) -> String {
        self.entries
            .get(class_id)
            .map(|entry| entry.display_name.clone())
            .unwrap_or_else(|| ControllerNode::format_class_id(class_id))
    }

    /// Build an uninitialized node. Nothing is constructed on failure.
    pub fn make(&self, class_id: &str) -> Result<ControllerNode, FactoryError> {
        let entry = self
            .entries
            .get(class_id)
            .ok_or_else(|| FactoryError::UnknownClass(class_id.to_string()))?;
        let controller = (entry.constructor)().map_err(|reason| FactoryError::Constructor {
            class_id: class_id.to_string(),
            reason,
        })?;
        Ok(ControllerNode::new(class_id, controller))
    }
}
