use std::sync::{Arc, Mutex};

use crate::logging::Logger;
use crate::metrics::RegistryMetrics;

/// Configuration knobs for [`ControllerRegistry`](crate::ControllerRegistry).
#[derive(Clone)]
pub struct RegistryConfig {
    /// Class created by `initialize()`.
    pub default_class: String,
    /// Display name given to whichever controller occupies the current slot.
    pub current_name: String,
    /// Optional structured logger used by the registry.
    pub logger: Option<Logger>,
    /// Counters updated on installs, copies, loads and ticks.
    pub metrics: Option<Arc<Mutex<RegistryMetrics>>>,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_class: "Orbit".to_string(),
            current_name: "Current View".to_string(),
            logger: None,
            metrics: None,
            metrics_target: "controller_registry::metrics".to_string(),
        }
    }
}

impl RegistryConfig {
    pub fn with_default_class(mut self, class_id: impl Into<String>) -> Self {
        self.default_class = class_id.into();
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(RegistryMetrics::new())));
        }
    }

    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    pub fn metrics_handle(&self) -> Option<Arc<Mutex<RegistryMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}
