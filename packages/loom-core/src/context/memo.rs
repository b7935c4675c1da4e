//! Per-scope memoization primitives

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::OnceCell;

use super::use_memoization_map;

type Shared = Arc<dyn Any + Send + Sync>;
type Provider<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Key of a memoized slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemoKey {
    /// Identity of a getter
    Identity(usize),
    /// Caller-chosen name
    Named(Cow<'static, str>),
}

impl MemoKey {
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Named(name.into())
    }

    fn identity_of<T: ?Sized>(value: &Arc<T>) -> Self {
        Self::Identity(Arc::as_ptr(value) as *const () as usize)
    }
}

/// Content of a memoized slot
#[derive(Clone)]
pub enum MemoEntry {
    /// A cached value
    Value(Shared),
    /// An overriding getter registered by [`Injectable::provide`]
    Provider(Shared),
}

impl fmt::Debug for MemoEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("MemoEntry::Value"),
            Self::Provider(_) => f.write_str("MemoEntry::Provider"),
        }
    }
}

/// Identity-keyed store shared by everything resolved in one scope
#[derive(Clone, Default)]
pub struct MemoizationMap(Arc<DashMap<MemoKey, MemoEntry>>);

impl MemoizationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &MemoKey) -> Option<MemoEntry> {
        self.0.get(key).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, key: MemoKey, entry: MemoEntry) {
        self.0.insert(key, entry);
    }

    /// Get the entry under `key`, inserting one built by `init` if absent
    pub fn get_or_insert_with(&self, key: MemoKey, init: impl FnOnce() -> MemoEntry) -> MemoEntry {
        self.0.entry(key).or_insert_with(init).value().clone()
    }

    pub fn remove(&self, key: &MemoKey) -> bool {
        self.0.remove(key).is_some()
    }

    pub fn contains(&self, key: &MemoKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether both handles point at the same map
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MemoizationMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizationMap")
            .field("len", &self.0.len())
            .finish()
    }
}

impl FromIterator<(MemoKey, MemoEntry)> for MemoizationMap {
    fn from_iter<I: IntoIterator<Item = (MemoKey, MemoEntry)>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

// ==================== Memoized ====================

/// A value computed at most once per memoization scope
///
/// Outside any scope the getter runs on every call.
pub struct Memoized<T> {
    getter: Arc<dyn Fn() -> T + Send + Sync>,
    key: MemoKey,
}

impl<T: Clone + Send + Sync + 'static> Memoized<T> {
    /// Memoize a getter, keyed by the getter's identity
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let getter: Arc<dyn Fn() -> T + Send + Sync> = Arc::new(getter);
        let key = MemoKey::identity_of(&getter);
        Self { getter, key }
    }

    /// Memoize a getter under an explicit key
    pub fn with_key<F>(key: MemoKey, getter: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            getter: Arc::new(getter),
            key,
        }
    }

    pub fn key(&self) -> &MemoKey {
        &self.key
    }

    pub fn get(&self) -> T {
        let Some(map) = use_memoization_map() else {
            return (self.getter)();
        };

        if let Some(MemoEntry::Value(cached)) = map.get(&self.key) {
            if let Some(value) = cached.downcast_ref::<T>() {
                return value.clone();
            }
        }

        // The getter may itself read other memoized values, so no map
        // entry is held while it runs.
        let value = (self.getter)();
        map.insert(self.key.clone(), MemoEntry::Value(Arc::new(value.clone())));
        value
    }

    /// Replace the cached value; `false` when no scope is active
    pub fn set(&self, value: T) -> bool {
        match use_memoization_map() {
            Some(map) => {
                map.insert(self.key.clone(), MemoEntry::Value(Arc::new(value)));
                true
            }
            None => false,
        }
    }

    /// Drop the cached value; `false` when nothing was cached
    pub fn clear(&self) -> bool {
        use_memoization_map().is_some_and(|map| map.remove(&self.key))
    }

    pub fn exists(&self) -> bool {
        use_memoization_map().is_some_and(|map| map.contains(&self.key))
    }
}

impl<T> fmt::Debug for Memoized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized").field("key", &self.key).finish()
    }
}

// ==================== AsyncMemoized ====================

/// Asynchronous counterpart of [`Memoized`]
///
/// Concurrent callers inside one scope share a single evaluation.
pub struct AsyncMemoized<T> {
    getter: Arc<dyn Fn() -> BoxFuture<'static, T> + Send + Sync>,
    key: MemoKey,
}

impl<T: Clone + Send + Sync + 'static> AsyncMemoized<T> {
    pub fn new<F, Fut>(getter: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let getter: Arc<dyn Fn() -> BoxFuture<'static, T> + Send + Sync> =
            Arc::new(move || getter().boxed());
        let key = MemoKey::identity_of(&getter);
        Self { getter, key }
    }

    pub fn with_key<F, Fut>(key: MemoKey, getter: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self {
            getter: Arc::new(move || getter().boxed()),
            key,
        }
    }

    pub fn key(&self) -> &MemoKey {
        &self.key
    }

    pub async fn get(&self) -> T {
        let Some(map) = use_memoization_map() else {
            return (self.getter)().await;
        };

        let entry = map.get_or_insert_with(self.key.clone(), || {
            MemoEntry::Value(Arc::new(OnceCell::<T>::new()))
        });

        let cell = match entry {
            MemoEntry::Value(shared) => shared.downcast::<OnceCell<T>>().ok(),
            MemoEntry::Provider(_) => None,
        };

        match cell {
            Some(cell) => cell.get_or_init(|| (self.getter)()).await.clone(),
            None => (self.getter)().await,
        }
    }

    /// Replace the cached value; `false` when no scope is active
    pub fn set(&self, value: T) -> bool {
        match use_memoization_map() {
            Some(map) => {
                let cell = OnceCell::new_with(Some(value));
                map.insert(self.key.clone(), MemoEntry::Value(Arc::new(cell)));
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) -> bool {
        use_memoization_map().is_some_and(|map| map.remove(&self.key))
    }

    /// Whether a value has been computed in the current scope
    pub fn exists(&self) -> bool {
        let Some(map) = use_memoization_map() else {
            return false;
        };
        match map.get(&self.key) {
            Some(MemoEntry::Value(shared)) => shared
                .downcast_ref::<OnceCell<T>>()
                .is_some_and(OnceCell::initialized),
            _ => false,
        }
    }
}

impl<T> fmt::Debug for AsyncMemoized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncMemoized").field("key", &self.key).finish()
    }
}

// ==================== Injectable ====================

/// A value whose getter can be replaced per scope
pub struct Injectable<T> {
    default: Arc<dyn Fn() -> T + Send + Sync>,
    key: MemoKey,
}

impl<T: Send + Sync + 'static> Injectable<T> {
    pub fn new<F>(default: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let default: Arc<dyn Fn() -> T + Send + Sync> = Arc::new(default);
        let key = MemoKey::identity_of(&default);
        Self { default, key }
    }

    pub fn with_key<F>(key: MemoKey, default: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            default: Arc::new(default),
            key,
        }
    }

    pub fn key(&self) -> &MemoKey {
        &self.key
    }

    /// Call the provided getter if one is in scope, else the default
    pub fn get(&self) -> T {
        let provided = use_memoization_map().and_then(|map| match map.get(&self.key) {
            Some(MemoEntry::Provider(shared)) => shared.downcast::<Provider<T>>().ok(),
            _ => None,
        });

        match provided {
            Some(provider) => provider(),
            None => (self.default)(),
        }
    }

    /// Entry that overrides the getter once inserted into a map
    pub fn provide<F>(&self, getter: F) -> (MemoKey, MemoEntry)
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let provider: Provider<T> = Box::new(getter);
        (self.key.clone(), MemoEntry::Provider(Arc::new(provider)))
    }
}

impl<T> fmt::Debug for Injectable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injectable").field("key", &self.key).finish()
    }
}
