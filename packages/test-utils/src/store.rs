//! In-memory user store for resolver tests
//!
//! Counts every lookup so tests can tell whether memoization and request
//! loaders actually saved a trip.
//!
//! Locks recover from poisoning with `unwrap_or_else(|e| e.into_inner())`, so
//! a test that panics while holding one does not fail the tests after it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_graphql::dataloader::Loader;
use async_graphql::Value;

/// Users keyed by id, stored as GraphQL values
///
/// Clones share the same users and counters.
///
/// ```rust
/// use loom_test_utils::MockUserStore;
///
/// let store = MockUserStore::seeded();
/// assert!(store.find("1").is_some());
/// assert_eq!(store.lookups(), 1);
/// ```
#[derive(Clone, Default)]
pub struct MockUserStore {
    users: Arc<RwLock<HashMap<String, Value>>>,
    lookups: Arc<AtomicUsize>,
    batches: Arc<AtomicUsize>,
}

impl MockUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding two users, "1" (an admin) and "2"
    pub fn seeded() -> Self {
        let store = Self::new();
        store.insert(serde_json::json!({
            "id": "1",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "role": "ADMIN",
        }));
        store.insert(serde_json::json!({
            "id": "2",
            "firstName": "Alan",
            "lastName": "Turing",
            "email": null,
            "role": "MEMBER",
        }));
        store
    }

    /// Insert a user; its `id` entry is the key
    pub fn insert(&self, user: serde_json::Value) {
        let id = user
            .get("id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let value = Value::from_json(user).unwrap_or(Value::Null);
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users.insert(id, value);
    }

    /// Find one user, counting the lookup
    pub fn find(&self, id: &str) -> Option<Value> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        users.get(id).cloned()
    }

    /// Find many users in one batch, counting the batch
    pub fn find_many(&self, ids: &[String]) -> HashMap<String, Value> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        ids.iter()
            .filter_map(|id| users.get(id).map(|user| (id.clone(), user.clone())))
            .collect()
    }

    /// All users, ordered by id
    pub fn all(&self) -> Vec<Value> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<_> = users.keys().cloned().collect();
        ids.sort();
        ids.iter().filter_map(|id| users.get(id).cloned()).collect()
    }

    /// Number of single lookups so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of batch lookups so far
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

/// DataLoader over a [`MockUserStore`]
pub struct UserLoader {
    store: MockUserStore,
}

impl UserLoader {
    pub fn new(store: MockUserStore) -> Self {
        Self { store }
    }
}

impl Loader<String> for UserLoader {
    type Value = Value;
    type Error = Arc<String>;

    async fn load(&self, keys: &[String]) -> Result<HashMap<String, Self::Value>, Self::Error> {
        Ok(self.store.find_many(keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_counts_lookups() {
        let store = MockUserStore::seeded();
        assert!(store.find("1").is_some());
        assert!(store.find("404").is_none());
        assert_eq!(store.lookups(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let store = MockUserStore::new();
        let clone = store.clone();
        clone.insert(serde_json::json!({ "id": "7" }));
        assert!(store.find("7").is_some());
        assert_eq!(clone.lookups(), 1);
    }

    #[test]
    fn test_find_many_counts_batches() {
        let store = MockUserStore::seeded();
        let found = store.find_many(&["1".to_string(), "2".to_string(), "3".to_string()]);
        assert_eq!(found.len(), 2);
        assert_eq!(store.batches(), 1);
        assert_eq!(store.lookups(), 0);
    }

    #[test]
    fn test_loader_reads_one_batch() {
        let store = MockUserStore::seeded();
        let loader = UserLoader::new(store.clone());
        let keys = ["1".to_string(), "2".to_string()];
        let found = tokio_test::block_on(loader.load(&keys)).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(store.batches(), 1);
    }

    #[test]
    fn test_all_is_ordered() {
        let ids: Vec<_> = MockUserStore::seeded()
            .all()
            .into_iter()
            .filter_map(|user| match user {
                Value::Object(fields) => fields.get("id").cloned(),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![Value::from("1"), Value::from("2")]);
    }
}
