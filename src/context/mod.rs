mod shared_state;

pub use shared_state::{SharedState, SharedStateError};

use std::sync::Arc;

use crate::logging::Logger;

/// Opaque handle handed to every controller during initialization.
///
/// Hosts stash whatever a controller variant needs (scene handles, input
/// settings, ...) into the shared resource map before the registry creates
/// anything. Cloning is cheap; all clones see the same resources.
#[derive(Clone, Default)]
pub struct ControllerContext {
    shared: SharedState,
    logger: Option<Logger>,
}

impl ControllerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    pub fn logger(&self) -> Option<&Logger> {
        self.logger.as_ref()
    }

    /// Convenience for `shared().insert_arc(Arc::new(value))`.
    pub fn provide<T>(&self, value: T) -> Result<Arc<T>, SharedStateError>
    where
        T: Send + Sync + 'static,
    {
        let value = Arc::new(value);
        self.shared.insert_arc(Arc::clone(&value))?;
        Ok(value)
    }

    pub fn resource<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.shared.get::<T>().ok()
    }
}
