//! Walks a registry through the usual host interactions and prints the
//! persisted state. Logs go to `registry_demo.log` as JSON lines.

use std::sync::Arc;

use controller_registry::{
    ControllerContext, ControllerFactory, ControllerRegistry, FileSink, Logger, OrbitController,
    RegistryConfig, RegistryObserver, RegistrySignal,
};

struct PrintObserver;

impl RegistryObserver for PrintObserver {
    fn on_signal(&self, signal: RegistrySignal) {
        println!("signal: {signal:?}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = Logger::new(FileSink::new("registry_demo.log", 1 << 20)?);
    let mut config = RegistryConfig::default().with_logger(logger.clone());
    config.enable_metrics();

    let mut registry = ControllerRegistry::new(
        ControllerFactory::with_builtin(),
        ControllerContext::new().with_logger(logger),
        config,
    );
    registry.subscribe(Arc::new(PrintObserver));
    registry.initialize()?;

    if let Some(orbit) = registry
        .get_current_mut()
        .and_then(|node| node.downcast_mut::<OrbitController>())
    {
        orbit.set_distance(4.0);
    }
    registry.copy_current_to_saved_list()?;
    registry.set_current_controller_type("FirstPerson")?;
    registry.update(0.016, 0.016);

    let saved = registry.save_json()?;
    println!("{saved}");

    let mut restored = ControllerRegistry::with_builtin();
    let report = restored.load_json(&saved)?;
    println!(
        "restored current={:?} saved={} skipped={}",
        restored.get_current().map(|node| node.class_id()),
        restored.count(),
        report.skipped.len()
    );

    registry.log_metrics();
    Ok(())
}
