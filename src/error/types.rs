use thiserror::Error;

use crate::context::SharedStateError;

/// Unified result type for the controller registry crate.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors surfaced by the registry and the controllers it owns.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to create controller `{class_id}`: {reason}")]
    CreationFailed { class_id: String, reason: String },
    #[error("controller `{class_id}` rejected its config: {reason}")]
    Load { class_id: String, reason: String },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("shared state error: {0}")]
    SharedState(#[from] SharedStateError),
}

impl RegistryError {
    pub fn load(class_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            class_id: class_id.into(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by a [`ControllerFactory`](crate::ControllerFactory). No
/// controller object exists when one of these is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FactoryError {
    #[error("unknown controller class `{0}`")]
    UnknownClass(String),
    #[error("constructor for `{class_id}` failed: {reason}")]
    Constructor { class_id: String, reason: String },
}

impl FactoryError {
    pub fn class_id(&self) -> &str {
        match self {
            FactoryError::UnknownClass(class_id) => class_id,
            FactoryError::Constructor { class_id, .. } => class_id,
        }
    }
}

impl From<FactoryError> for RegistryError {
    fn from(err: FactoryError) -> Self {
        RegistryError::CreationFailed {
            class_id: err.class_id().to_string(),
            reason: err.to_string(),
        }
    }
}
