//! Process-scoped table of memoized values.
//!
//! A [`GlobalRegistry`] is created once by the application root and handed
//! to every [`PersistedWork`](crate::work::PersistedWork) that asks for
//! global visibility. Cells built with the same identity key share one slot,
//! so a value computed by one owner is reused by every later owner.
//!
//! Internally the registry is backed by [`DashMap`] and is cheaply
//! cloneable; all clones see the same table.
//!
//! # Example
//!
//! ```rust
//! # use confstash_persist::GlobalRegistry;
//! let registry = GlobalRegistry::new();
//! registry.insert_if_absent("answer", 42_u32);
//! registry.insert_if_absent("answer", 7_u32);
//! assert_eq!(registry.get::<u32>("answer"), Some(42));
//! ```

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;

type Slot = Arc<dyn Any + Send + Sync>;

/// Shared, type-erased value table keyed by cell identity.
#[derive(Clone, Default)]
pub struct GlobalRegistry {
    inner: Arc<DashMap<String, Slot>>,
}

impl GlobalRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone out the value stored under `key`.
    ///
    /// Returns `None` when the slot is empty or holds a different type.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entry = self.inner.get(key)?;
        let value = entry.value().downcast_ref::<T>().cloned();
        if value.is_none() {
            tracing::warn!(key, "global slot holds a different type");
        }
        value
    }

    /// Store `value` under `key` unless the slot is already occupied.
    ///
    /// Returns `true` if the value was stored.
    pub fn insert_if_absent<T>(&self, key: &str, value: T) -> bool
    where
        T: Send + Sync + 'static,
    {
        if self.inner.contains_key(key) {
            return false;
        }
        self.inner.insert(key.to_string(), Arc::new(value));
        tracing::debug!(key, "global slot set");
        true
    }

    /// Remove the slot for `key`, returning whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.inner.remove(key).is_some();
        if removed {
            tracing::debug!(key, "global slot removed");
        }
        removed
    }

    /// Whether a slot exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every slot, e.g. at process shutdown.
    pub fn clear(&self) {
        tracing::debug!(slots = self.inner.len(), "global registry cleared");
        self.inner.clear();
    }
}

impl std::fmt::Debug for GlobalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalRegistry")
            .field("slots", &self.inner.len())
            .finish()
    }
}

// ── tests ────────────────────────────────────────────────────────────
