//! Observable key-path state store
//!
//! The pipeline writes its public state here; UI layers read from it. Only the
//! publisher writes.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

/// Last published outcome
pub const KEY_LAST_PREDICTION: &str = "prediction.last";
/// Last actionable outcome
pub const KEY_LAST_ACTIONABLE: &str = "prediction.actionable";
/// Whether the dispatch queue is working
pub const KEY_ACTIVE: &str = "prediction.active";
/// Running statistics
pub const KEY_STATS: &str = "prediction.stats";

/// Key-path store consumed by the publisher
pub trait StateStore: Send + Sync {
    fn set(&self, key_path: &str, value: Value);
    fn get(&self, key_path: &str) -> Option<Value>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every key currently set
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values.read().clone()
    }
}

impl StateStore for MemoryStore {
    fn set(&self, key_path: &str, value: Value) {
        self.values.write().insert(key_path.to_string(), value);
    }

    fn get(&self, key_path: &str) -> Option<Value> {
        self.values.read().get(key_path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_overwrites() {
        let store = MemoryStore::new();
        assert!(store.get(KEY_ACTIVE).is_none());
        store.set(KEY_ACTIVE, json!(true));
        store.set(KEY_ACTIVE, json!(false));
        assert_eq!(store.get(KEY_ACTIVE), Some(json!(false)));
        assert_eq!(store.snapshot().len(), 1);
    }
}
