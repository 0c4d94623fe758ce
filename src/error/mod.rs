mod types;

pub use types::{FactoryError, RegistryError, Result};
