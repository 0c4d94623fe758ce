//! Change notifications raised by the registry.
//!
//! Signals carry no payload; a host UI reacts by re-reading whatever it shows.

use std::sync::Mutex;

use crate::controller::ControllerNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrySignal {
    /// A different controller now occupies the current slot.
    CurrentChanged,
    /// Something persisted by [`save`](crate::ControllerRegistry::save) changed.
    ConfigChanged,
}

/// Subscriber for registry signals. Called synchronously from the registry.
pub trait RegistryObserver: Send + Sync {
    fn on_signal(&self, signal: RegistrySignal);
}

/// Observer that records every signal it receives.
#[derive(Debug, Default)]
pub struct SignalLog {
    signals: Mutex<Vec<RegistrySignal>>,
}

impl SignalLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<RegistrySignal> {
        self.signals
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn take(&self) -> Vec<RegistrySignal> {
        self.signals
            .lock()
            .map(|mut guard| std::mem::take(&mut *guard))
            .unwrap_or_default()
    }

    pub fn count(&self, signal: RegistrySignal) -> usize {
        self.snapshot().iter().filter(|seen| **seen == signal).count()
    }
}

impl RegistryObserver for SignalLog {
    fn on_signal(&self, signal: RegistrySignal) {
        if let Ok(mut guard) = self.signals.lock() {
            guard.push(signal);
        }
    }
}

/// Display surface driven by the current controller.
pub trait RenderTarget: Send {
    /// Called during install, after the registry already reports `controller`
    /// as current.
    fn on_controller_changed(&mut self, controller: &ControllerNode);
}
