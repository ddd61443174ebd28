//! Per-worker map from string id to a registered artifact.
//!
//! Entries are type-erased (`Arc<dyn Any + Send + Sync>`) tagged with their
//! `type_name`, and `get::<T>` downcasts, reporting `TypeMismatch` (naming
//! both the expected and the actually stored type) instead of panicking.
//!
//! The registry is the only root of ownership for artifacts after
//! publication -- callers hold `Arc<T>` clones, never a mutable reference
//! into the map, so concurrent reads never race with concurrent
//! registrations of *other* ids.

use crate::error::EngineError;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// Process-wide (per-worker) artifact registry.
#[derive(Default)]
pub struct ObjectRegistry {
    items: Mutex<HashMap<String, Entry>>,
}

impl ObjectRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new artifact under `id`. Fails with `DuplicateId` if the
    /// id is already present.
    pub fn put<T: Any + Send + Sync>(
        &self,
        id: impl Into<String>,
        value: Arc<T>,
    ) -> Result<(), EngineError> {
        let id = id.into();
        let mut items = self.items.lock().unwrap();
        if items.contains_key(&id) {
            return Err(EngineError::DuplicateId(id));
        }
        items.insert(
            id,
            Entry {
                value,
                type_name: type_name::<T>(),
            },
        );
        Ok(())
    }

    /// Fetch an artifact, downcasting to `T`. Fails with `NotFound` if the
    /// id is absent, or `TypeMismatch` if the stored artifact is a
    /// different concrete type.
    pub fn get<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>, EngineError> {
        let items = self.items.lock().unwrap();
        let entry = items
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        Arc::clone(&entry.value)
            .downcast::<T>()
            .map_err(|_| EngineError::TypeMismatch {
                id: id.to_string(),
                expected: type_name::<T>(),
                found: entry.type_name,
            })
    }

    /// True if `id` is present, regardless of its concrete type.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.items.lock().unwrap().contains_key(id)
    }

    /// Remove and return the artifact's type-erased handle. Fails with
    /// `NotFound` if the id is absent.
    pub fn remove(&self, id: &str) -> Result<(), EngineError> {
        let mut items = self.items.lock().unwrap();
        items
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Number of registered artifacts (diagnostics only).
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
