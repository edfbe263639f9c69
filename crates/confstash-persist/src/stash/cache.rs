//! In-memory stash and the read-through cache layer.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{PersistError, PersistResult};
use crate::stash::Stash;

// ═══════════════════════════════════════════════════════════════════════
//  DictionaryStash
// ═══════════════════════════════════════════════════════════════════════

/// A stash backed by a `HashMap`.
///
/// Deleting a missing key is a [`PersistError::NotFound`] error.
#[derive(Debug, Clone)]
pub struct DictionaryStash<V> {
    data: HashMap<String, V>,
}

impl<V> Default for DictionaryStash<V> {
    fn default() -> Self {
        Self {
            data: HashMap::new(),
        }
    }
}

impl<V> DictionaryStash<V> {
    /// Create an empty stash.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stash over existing entries.
    pub fn from_map(data: HashMap<String, V>) -> Self {
        Self { data }
    }

    /// Borrow the backing map.
    pub fn data(&self) -> &HashMap<String, V> {
        &self.data
    }
}

impl<V: Clone> Stash<V> for DictionaryStash<V> {
    fn load(&mut self, name: &str) -> PersistResult<Option<V>> {
        Ok(self.data.get(name).cloned())
    }

    fn exists(&mut self, name: &str) -> PersistResult<bool> {
        Ok(self.data.contains_key(name))
    }

    fn dump(&mut self, name: &str, value: &V) -> PersistResult<()> {
        self.data.insert(name.to_string(), value.clone());
        Ok(())
    }

    fn delete(&mut self, name: &str) -> PersistResult<()> {
        self.data
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| PersistError::NotFound {
                entity: "stash entry",
                key: name.to_string(),
            })
    }

    fn keys(&mut self) -> PersistResult<Vec<String>> {
        Ok(self.data.keys().cloned().collect())
    }

    fn clear(&mut self) -> PersistResult<()> {
        self.data.clear();
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  CacheStash
// ═══════════════════════════════════════════════════════════════════════

/// A fast cache stash layered in front of a slower delegate.
///
/// `load` reads the cache first and fills it from the delegate on a miss;
/// `exists` is true if either layer has the key.
///
/// ```rust
/// # use confstash_persist::{CacheStash, DictionaryStash, Stash};
/// let mut slow = DictionaryStash::new();
/// slow.dump("a", &1_u32).unwrap();
///
/// let mut stash = CacheStash::new(slow);
/// assert_eq!(stash.load("a").unwrap(), Some(1));
/// assert!(stash.cache_mut().exists("a").unwrap());
/// ```
#[derive(Debug)]
pub struct CacheStash<S, C> {
    delegate: S,
    cache: C,
}

impl<S, V> CacheStash<S, DictionaryStash<V>> {
    /// Layer a fresh [`DictionaryStash`] in front of `delegate`.
    pub fn new(delegate: S) -> Self {
        Self::with_cache(delegate, DictionaryStash::new())
    }
}

impl<S, C> CacheStash<S, C> {
    /// Layer `cache` in front of `delegate`.
    pub fn with_cache(delegate: S, cache: C) -> Self {
        Self { delegate, cache }
    }

    /// The slow backing stash.
    pub fn delegate_mut(&mut self) -> &mut S {
        &mut self.delegate
    }

    /// The fast cache stash.
    pub fn cache_mut(&mut self) -> &mut C {
        &mut self.cache
    }

    /// Unwrap into `(delegate, cache)`.
    pub fn into_parts(self) -> (S, C) {
        (self.delegate, self.cache)
    }
}

impl<V, S, C> Stash<V> for CacheStash<S, C>
where
    S: Stash<V>,
    C: Stash<V>,
{
    fn load(&mut self, name: &str) -> PersistResult<Option<V>> {
        if let Some(value) = self.cache.load(name)? {
            debug!(key = name, "cache hit");
            return Ok(Some(value));
        }
        let value = self.delegate.load(name)?;
        if let Some(value) = &value {
            debug!(key = name, "cache miss, populating");
            self.cache.dump(name, value)?;
        }
        Ok(value)
    }

    fn exists(&mut self, name: &str) -> PersistResult<bool> {
        Ok(self.cache.exists(name)? || self.delegate.exists(name)?)
    }

    fn dump(&mut self, name: &str, value: &V) -> PersistResult<()> {
        self.delegate.dump(name, value)?;
        self.cache.dump(name, value)
    }

    fn delete(&mut self, name: &str) -> PersistResult<()> {
        if self.cache.exists(name)? {
            self.cache.delete(name)?;
        }
        self.delegate.delete(name)
    }

    fn keys(&mut self) -> PersistResult<Vec<String>> {
        self.delegate.keys()
    }

    fn clear(&mut self) -> PersistResult<()> {
        self.cache.clear()?;
        self.delegate.clear()
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts delegate loads.
    struct CountingStash {
        inner: DictionaryStash<u32>,
        loads: usize,
    }

    impl Stash<u32> for CountingStash {
        fn load(&mut self, name: &str) -> PersistResult<Option<u32>> {
            self.loads += 1;
            self.inner.load(name)
        }
        fn dump(&mut self, name: &str, value: &u32) -> PersistResult<()> {
            self.inner.dump(name, value)
        }
        fn delete(&mut self, name: &str) -> PersistResult<()> {
            self.inner.delete(name)
        }
        fn keys(&mut self) -> PersistResult<Vec<String>> {
            self.inner.keys()
        }
    }

    fn cached() -> CacheStash<CountingStash, DictionaryStash<u32>> {
        CacheStash::new(CountingStash {
            inner: DictionaryStash::new(),
            loads: 0,
        })
    }

    #[test]
    fn dictionary_round_trip_and_delete() {
        let mut stash = DictionaryStash::new();
        stash.dump("a", &"x".to_string()).unwrap();
        assert!(stash.exists("a").unwrap());
        assert_eq!(stash.load("a").unwrap().as_deref(), Some("x"));
        stash.delete("a").unwrap();
        assert!(!stash.exists("a").unwrap());
        assert_eq!(stash.load("a").unwrap(), None);
    }

    #[test]
    fn dictionary_delete_missing_is_not_found() {
        let mut stash: DictionaryStash<u32> = DictionaryStash::new();
        let err = stash.delete("nope").unwrap_err();
        assert!(matches!(err, PersistError::NotFound { .. }));
    }

    #[test]
    fn load_populates_cache_once() {
        let mut stash = cached();
        // Bypass the cache.
        stash.delegate_mut().dump("k", &5).unwrap();
        assert!(!stash.cache_mut().exists("k").unwrap());

        assert_eq!(stash.load("k").unwrap(), Some(5));
        assert_eq!(stash.delegate_mut().loads, 1);
        assert!(stash.cache_mut().exists("k").unwrap());

        assert_eq!(stash.load("k").unwrap(), Some(5));
        assert_eq!(stash.delegate_mut().loads, 1);
    }

    #[test]
    fn exists_checks_both_layers() {
        let mut stash = cached();
        stash.cache_mut().dump("only_cache", &1).unwrap();
        stash.delegate_mut().dump("only_delegate", &2).unwrap();
        assert!(stash.exists("only_cache").unwrap());
        assert!(stash.exists("only_delegate").unwrap());
        assert!(!stash.exists("neither").unwrap());
    }

    #[test]
    fn delete_removes_from_both() {
        let mut stash = cached();
        stash.dump("k", &1).unwrap();
        assert!(stash.cache_mut().exists("k").unwrap());
        stash.delete("k").unwrap();
        assert!(!stash.exists("k").unwrap());
    }

    #[test]
    fn delete_uncached_key_hits_delegate() {
        let mut stash = cached();
        stash.delegate_mut().dump("k", &1).unwrap();
        stash.delete("k").unwrap();
        assert!(!stash.delegate_mut().exists("k").unwrap());
    }

    #[test]
    fn miss_in_both_is_none() {
        let mut stash = cached();
        assert_eq!(stash.load("nope").unwrap(), None);
        assert!(!stash.cache_mut().exists("nope").unwrap());
    }
}
