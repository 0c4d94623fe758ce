use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

type ResourceMap = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

/// Type-erased resource map keyed by [`TypeId`]; each type can be stored once.
#[derive(Clone, Default)]
pub struct SharedState {
    inner: Arc<RwLock<ResourceMap>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_arc<T>(&self, value: Arc<T>) -> Result<(), SharedStateError>
    where
        T: Send + Sync + 'static,
    {
        let mut guard = self.inner.write().map_err(|_| SharedStateError::Poisoned)?;
        match guard.entry(TypeId::of::<T>()) {
            std::collections::hash_map::Entry::Occupied(_) => Err(SharedStateError::AlreadyExists),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(Box::new(value));
                Ok(())
            }
        }
    }

    pub fn get<T>(&self) -> Result<Arc<T>, SharedStateError>
    where
        T: Send + Sync + 'static,
    {
        let guard = self.inner.read().map_err(|_| SharedStateError::Poisoned)?;
        guard
            .get(&TypeId::of::<T>())
            .ok_or(SharedStateError::Missing)?
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or(SharedStateError::TypeMismatch)
    }

    pub fn contains<T>(&self) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.inner
            .read()
            .map(|guard| guard.contains_key(&TypeId::of::<T>()))
            .unwrap_or(false)
    }

    pub fn get_or_insert_with<T, F>(&self, make: F) -> Result<Arc<T>, SharedStateError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let mut guard = self.inner.write().map_err(|_| SharedStateError::Poisoned)?;
        let boxed = guard
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Arc::new(make())) as Box<dyn Any + Send + Sync>);
        boxed
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or(SharedStateError::TypeMismatch)
    }

    pub fn remove<T>(&self) -> Result<Arc<T>, SharedStateError>
    where
        T: Send + Sync + 'static,
    {
        let mut guard = self.inner.write().map_err(|_| SharedStateError::Poisoned)?;
        let boxed = guard
            .remove(&TypeId::of::<T>())
            .ok_or(SharedStateError::Missing)?;
        boxed
            .downcast::<Arc<T>>()
            .map(|arc| *arc)
            .map_err(|_| SharedStateError::TypeMismatch)
    }
}

#[derive(Debug, Error)]
pub enum SharedStateError {
    #[error("resource already exists")]
    AlreadyExists,
    #[error("resource missing")]
    Missing,
    #[error("resource type mismatch")]
    TypeMismatch,
    #[error("shared state poisoned")]
    Poisoned,
}
