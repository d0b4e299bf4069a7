use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::Value;

use super::{ObjectIter, ObjectStore};
use crate::error::Result;

/// In-memory object store for unit tests.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<(String, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<(String, String), Value>> {
        self.objects.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<(String, String), Value>> {
        self.objects.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, type_name: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .read()
            .get(&(type_name.to_string(), id.to_string()))
            .cloned())
    }

    fn set(&self, type_name: &str, id: &str, body: &Value) -> Result<()> {
        self.write()
            .insert((type_name.to_string(), id.to_string()), body.clone());
        Ok(())
    }

    fn delete(&self, type_name: &str, id: &str) -> Result<bool> {
        Ok(self
            .write()
            .remove(&(type_name.to_string(), id.to_string()))
            .is_some())
    }

    fn stream_all<'a>(&'a self, type_name: &str) -> Result<ObjectIter<'a>> {
        // Snapshot of the matching bodies; fine for test-sized data.
        let bodies: Vec<Value> = self
            .read()
            .iter()
            .filter(|((t, _), _)| t == type_name)
            .map(|(_, body)| body.clone())
            .collect();

        Ok(Box::new(bodies.into_iter().map(Ok)))
    }
}
