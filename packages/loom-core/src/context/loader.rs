//! Request-scoped DataLoader instances
//!
//! A [`RequestLoader`] memoizes one `DataLoader` per memoization scope, so
//! keys batch together within a request and never leak into the next one.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use async_graphql::dataloader::{DataLoader, Loader};

use super::memo::{MemoKey, Memoized};

/// Factory of per-request `DataLoader`s
pub struct RequestLoader<L: Send + Sync + 'static> {
    memo: Memoized<Arc<DataLoader<L>>>,
}

impl<L: Send + Sync + 'static> RequestLoader<L> {
    /// Build loaders with `factory`; each scope gets its own instance
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> L + Send + Sync + 'static,
    {
        Self {
            memo: Memoized::new(move || Arc::new(DataLoader::new(factory(), tokio::spawn))),
        }
    }

    /// Same as [`RequestLoader::new`] with an explicit memo key
    pub fn with_key<F>(key: MemoKey, factory: F) -> Self
    where
        F: Fn() -> L + Send + Sync + 'static,
    {
        Self {
            memo: Memoized::with_key(key, move || {
                Arc::new(DataLoader::new(factory(), tokio::spawn))
            }),
        }
    }

    /// The loader of the current scope
    pub fn loader(&self) -> Arc<DataLoader<L>> {
        self.memo.get()
    }

    /// Load one key through the current scope's loader
    pub async fn load_one<K>(&self, key: K) -> Result<Option<L::Value>, L::Error>
    where
        K: Send + Sync + Hash + Eq + Clone + 'static,
        L: Loader<K>,
    {
        self.loader().load_one(key).await
    }

    /// Load many keys through the current scope's loader
    pub async fn load_many<K, I>(
        &self,
        keys: I,
    ) -> Result<HashMap<K, L::Value>, L::Error>
    where
        K: Send + Sync + Hash + Eq + Clone + 'static,
        I: IntoIterator<Item = K>,
        L: Loader<K>,
    {
        self.loader().load_many(keys).await
    }
}

impl<L: Send + Sync + 'static> fmt::Debug for RequestLoader<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLoader")
            .field("key", self.memo.key())
            .finish()
    }
}
