//! Key-value stashes.
//!
//! A [`Stash`] is a keyed store of values with five core operations
//! (`load`, `exists`, `dump`, `delete`, `keys`). Iteration helpers are
//! provided on top of those. Key order is defined by each backend.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │  CacheStash     (DictionaryStash in front)    │
//! │  FactoryStash   (delegate, else factory)      │
//! │  PreemptiveStash(memoized has_data)           │
//! │  KeyLimitStash  (first N keys)                │
//! │  DelegateStash  (forward or null object)      │
//! ├───────────────────────────────────────────────┤
//! │  DictionaryStash │ DirectoryStash │ ShelveStash│
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Stashes are not thread-safe; wrap one in a [`SharedStash`] to use it
//! from several worker threads.

pub mod cache;
pub mod delegate;
pub mod directory;
pub mod shelve;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{PersistError, PersistResult};
use crate::task::chunks;

pub use cache::{CacheStash, DictionaryStash};
pub use delegate::{DelegateStash, FactoryStash, KeyLimitStash, PreemptiveStash};
pub use directory::DirectoryStash;
pub use shelve::ShelveStash;

/// A keyed store of `V` values.
///
/// After `dump(k, v)`, `exists(k)` is true and `load(k)` yields `v`; after
/// `delete(k)`, `exists(k)` is false.
pub trait Stash<V> {
    /// Load the value stored under `name`, `None` if absent.
    fn load(&mut self, name: &str) -> PersistResult<Option<V>>;

    /// Whether a value is stored under `name`.
    fn exists(&mut self, name: &str) -> PersistResult<bool> {
        Ok(self.keys()?.iter().any(|k| k == name))
    }

    /// Store `value` under `name`, replacing any previous value.
    fn dump(&mut self, name: &str, value: &V) -> PersistResult<()>;

    /// Remove the value stored under `name`.
    fn delete(&mut self, name: &str) -> PersistResult<()>;

    /// All keys, in backend order.
    fn keys(&mut self) -> PersistResult<Vec<String>>;

    /// Remove every entry.
    fn clear(&mut self) -> PersistResult<()> {
        for key in self.keys()? {
            self.delete(&key)?;
        }
        Ok(())
    }

    /// All values, in key order.
    fn values(&mut self) -> PersistResult<Vec<V>> {
        Ok(self.items()?.into_iter().map(|(_, v)| v).collect())
    }

    /// All `(key, value)` pairs; keys that vanish mid-iteration are skipped.
    fn items(&mut self) -> PersistResult<Vec<(String, V)>> {
        let mut items = Vec::new();
        for key in self.keys()? {
            if let Some(value) = self.load(&key)? {
                items.push((key, value));
            }
        }
        Ok(items)
    }

    /// Number of keys.
    fn len(&mut self) -> PersistResult<usize> {
        Ok(self.keys()?.len())
    }

    /// Whether the stash has no keys.
    fn is_empty(&mut self) -> PersistResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Keys split into groups of at most `n`.
    fn key_groups(&mut self, n: usize) -> PersistResult<Vec<Vec<String>>> {
        if n == 0 {
            return Err(PersistError::InvalidArgument(
                "key group size must be positive".to_string(),
            ));
        }
        Ok(chunks(self.keys()?, n).collect())
    }
}

impl<V, S> Stash<V> for Box<S>
where
    S: Stash<V> + ?Sized,
{
    fn load(&mut self, name: &str) -> PersistResult<Option<V>> {
        (**self).load(name)
    }

    fn exists(&mut self, name: &str) -> PersistResult<bool> {
        (**self).exists(name)
    }

    fn dump(&mut self, name: &str, value: &V) -> PersistResult<()> {
        (**self).dump(name, value)
    }

    fn delete(&mut self, name: &str) -> PersistResult<()> {
        (**self).delete(name)
    }

    fn keys(&mut self) -> PersistResult<Vec<String>> {
        (**self).keys()
    }

    fn clear(&mut self) -> PersistResult<()> {
        (**self).clear()
    }
}

// ── shared stash ─────────────────────────────────────────────────────

/// A stash behind `Arc<Mutex<_>>` so worker threads can share it.
///
/// Every operation holds the lock for its duration only.
pub struct SharedStash<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedStash<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> SharedStash<S> {
    /// Wrap `stash` for shared use.
    pub fn new(stash: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stash)),
        }
    }

    /// Lock the underlying stash for a sequence of operations.
    pub fn lock(&self) -> PersistResult<MutexGuard<'_, S>> {
        self.inner
            .lock()
            .map_err(|e| PersistError::Poisoned(format!("shared stash: {e}")))
    }
}

impl<V, S> Stash<V> for SharedStash<S>
where
    S: Stash<V>,
{
    fn load(&mut self, name: &str) -> PersistResult<Option<V>> {
        self.lock()?.load(name)
    }

    fn exists(&mut self, name: &str) -> PersistResult<bool> {
        self.lock()?.exists(name)
    }

    fn dump(&mut self, name: &str, value: &V) -> PersistResult<()> {
        self.lock()?.dump(name, value)
    }

    fn delete(&mut self, name: &str) -> PersistResult<()> {
        self.lock()?.delete(name)
    }

    fn keys(&mut self) -> PersistResult<Vec<String>> {
        self.lock()?.keys()
    }

    fn clear(&mut self) -> PersistResult<()> {
        self.lock()?.clear()
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provided_iteration_helpers() {
        let mut stash = DictionaryStash::new();
        for i in 0..5_u32 {
            stash.dump(&i.to_string(), &(i * 10)).unwrap();
        }
        assert_eq!(stash.len().unwrap(), 5);
        assert!(!stash.is_empty().unwrap());

        let mut items = stash.items().unwrap();
        items.sort();
        assert_eq!(items[0], ("0".to_string(), 0));
        assert_eq!(items[4], ("4".to_string(), 40));

        let mut values = stash.values().unwrap();
        values.sort_unstable();
        assert_eq!(values, vec![0, 10, 20, 30, 40]);
    }

    #[test]
    fn key_groups_chunk_keys() {
        let mut stash = DictionaryStash::new();
        for i in 0..7_u32 {
            stash.dump(&i.to_string(), &i).unwrap();
        }
        let groups = stash.key_groups(3).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups.iter().map(Vec::len).sum::<usize>(), 7);
        assert!(stash.key_groups(0).is_err());
    }

    #[test]
    fn boxed_stash_forwards() {
        let mut stash: Box<dyn Stash<u32>> = Box::new(DictionaryStash::new());
        stash.dump("a", &1).unwrap();
        assert!(stash.exists("a").unwrap());
        assert_eq!(stash.load("a").unwrap(), Some(1));
        stash.clear().unwrap();
        assert!(stash.is_empty().unwrap());
    }

    #[test]
    fn shared_stash_across_threads() {
        let shared = SharedStash::new(DictionaryStash::<u32>::new());
        let handles: Vec<_> = (0..4_u32)
            .map(|i| {
                let mut s = shared.clone();
                std::thread::spawn(move || s.dump(&format!("k{i}"), &i).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut s = shared.clone();
        assert_eq!(s.len().unwrap(), 4);
        assert_eq!(s.load("k2").unwrap(), Some(2));
    }
}
