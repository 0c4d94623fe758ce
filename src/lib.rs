//! Registry of interchangeable view controllers.
//!
//! A [`ControllerRegistry`] owns a set of polymorphic [`Controller`]s built by a
//! [`ControllerFactory`]. Exactly one of them is current and sits in the front
//! slot of its [`ControllerContainer`]; the rest form an ordered saved list.
//! Switching controllers runs a transition or mimic hand-off, copies are made
//! only by saving into a [`Config`] tree and loading into a fresh instance, and
//! the whole set round-trips through `save`/`load`.
//!
//! ```
//! use controller_registry::ControllerRegistry;
//!
//! let mut registry = ControllerRegistry::with_builtin();
//! registry.initialize()?;
//! registry.copy_current_to_saved_list()?;
//! registry.set_current_controller_type("FirstPerson")?;
//! assert_eq!(registry.get_current().map(|c| c.class_id()), Some("FirstPerson"));
//! assert_eq!(registry.get_at(0).map(|c| c.class_id()), Some("Orbit"));
//! # Ok::<(), controller_registry::RegistryError>(())
//! ```

pub mod config;
pub mod container;
pub mod context;
pub mod controller;
pub mod controllers;
pub mod error;
pub mod factory;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod signals;

pub use config::{Config, ConfigValue};
pub use container::ControllerContainer;
pub use context::{ControllerContext, SharedState, SharedStateError};
pub use controller::{CameraPose, Controller, ControllerId, ControllerNode, EventFlow, HookId, StereoSettings};
pub use controllers::{FirstPersonController, OrbitController};
pub use error::{FactoryError, RegistryError, Result};
pub use factory::{ControllerConstructor, ControllerFactory};
pub use logging::{FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult, MemorySink};
pub use metrics::{MetricSnapshot, RegistryMetrics};
pub use registry::{ControllerRegistry, CurrentAlias, InstallMode, LoadReport, RegistryConfig, SkippedEntry};
pub use signals::{RegistryObserver, RegistrySignal, RenderTarget, SignalLog};
