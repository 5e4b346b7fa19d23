//! In-process gateway backed by a map of JSON values.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{Gateway, PersistenceError};
use crate::domain::Library;

/// Gateway that keeps libraries in memory.
///
/// Clones share the same storage, so a test can keep a handle while the
/// store owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    entries: Arc<Mutex<BTreeMap<String, Value>>>,
    fail_saves: Arc<AtomicBool>,
}

impl MemoryGateway {
    /// Create an empty gateway
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed raw JSON under a name (e.g. a legacy array)
    pub async fn insert_raw(&self, name: impl Into<String>, value: Value) {
        self.entries.lock().await.insert(name.into(), value);
    }

    /// Raw JSON currently stored under a name
    pub async fn raw(&self, name: &str) -> Option<Value> {
        self.entries.lock().await.get(name).cloned()
    }

    /// Make subsequent saves fail with an IO error
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }

    async fn load(&self, name: &str) -> Result<Option<Value>, PersistenceError> {
        Ok(self.entries.lock().await.get(name).cloned())
    }

    async fn save(&self, name: &str, library: &Library) -> Result<(), PersistenceError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated save failure",
            )));
        }

        let value = serde_json::to_value(library)?;
        self.entries.lock().await.insert(name.to_string(), value);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), PersistenceError> {
        self.entries.lock().await.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_load_list_delete() {
        let gateway = MemoryGateway::new();
        gateway.save("poetry", &Library::new()).await.unwrap();
        gateway.insert_raw("old", json!([])).await;

        assert_eq!(gateway.list().await.unwrap(), vec!["old", "poetry"]);
        assert_eq!(
            gateway.load("poetry").await.unwrap(),
            Some(json!({"summary": [], "details": {}}))
        );

        gateway.delete("poetry").await.unwrap();
        assert!(gateway.load("poetry").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let gateway = MemoryGateway::new();
        let handle = gateway.clone();

        gateway.save("a", &Library::new()).await.unwrap();
        assert!(handle.raw("a").await.is_some());

        handle.set_fail_saves(true);
        assert!(gateway.save("b", &Library::new()).await.is_err());
    }
}
