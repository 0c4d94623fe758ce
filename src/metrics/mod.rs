use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;

/// Counters describing what the registry has done since construction.
#[derive(Debug, Default, Clone)]
pub struct RegistryMetrics {
    installs: u64,
    mimics: u64,
    copies: u64,
    creation_failures: u64,
    loads: u64,
    skipped_entries: u64,
    updates: u64,
}

impl RegistryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_install(&mut self, mimic: bool) {
        self.installs = self.installs.saturating_add(1);
        if mimic {
            self.mimics = self.mimics.saturating_add(1);
        }
    }

    pub fn record_copy(&mut self) {
        self.copies = self.copies.saturating_add(1);
    }

    pub fn record_creation_failure(&mut self) {
        self.creation_failures = self.creation_failures.saturating_add(1);
    }

    pub fn record_load(&mut self, skipped: usize) {
        self.loads = self.loads.saturating_add(1);
        self.skipped_entries = self.skipped_entries.saturating_add(skipped as u64);
    }

    pub fn record_update(&mut self) {
        self.updates = self.updates.saturating_add(1);
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            installs: self.installs,
            mimics: self.mimics,
            copies: self.copies,
            creation_failures: self.creation_failures,
            loads: self.loads,
            skipped_entries: self.skipped_entries,
            updates: self.updates,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub installs: u64,
    pub mimics: u64,
    pub copies: u64,
    pub creation_failures: u64,
    pub loads: u64,
    pub skipped_entries: u64,
    pub updates: u64,
}

impl MetricSnapshot {
    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("installs".to_string(), json!(self.installs));
        map.insert("mimics".to_string(), json!(self.mimics));
        map.insert("copies".to_string(), json!(self.copies));
        map.insert("creation_failures".to_string(), json!(self.creation_failures));
        map.insert("loads".to_string(), json!(self.loads));
        map.insert("skipped_entries".to_string(), json!(self.skipped_entries));
        map.insert("updates".to_string(), json!(self.updates));
        map
    }

    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "registry_metrics", self.as_fields())
    }
}
