//! Composing stashes: forwarding, key limiting and factory fallback.

use std::fmt;

use tracing::{debug, info};

use crate::error::PersistResult;
use crate::stash::Stash;
use crate::work::{PersistedWork, persisted};

// ═══════════════════════════════════════════════════════════════════════
//  DelegateStash
// ═══════════════════════════════════════════════════════════════════════

/// Forwards every operation to an optional boxed delegate.
///
/// With no delegate it behaves as an empty stash that swallows writes.
pub struct DelegateStash<V> {
    delegate: Option<Box<dyn Stash<V> + Send>>,
}

impl<V> Default for DelegateStash<V> {
    fn default() -> Self {
        Self { delegate: None }
    }
}

impl<V> DelegateStash<V> {
    /// A stash with no delegate.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Forward to `delegate`.
    pub fn new<S>(delegate: S) -> Self
    where
        S: Stash<V> + Send + 'static,
    {
        Self {
            delegate: Some(Box::new(delegate)),
        }
    }

    /// Whether a delegate is attached.
    pub fn has_delegate(&self) -> bool {
        self.delegate.is_some()
    }
}

impl<V> fmt::Debug for DelegateStash<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateStash")
            .field("delegate", &self.delegate.is_some())
            .finish()
    }
}

impl<V> Stash<V> for DelegateStash<V> {
    fn load(&mut self, name: &str) -> PersistResult<Option<V>> {
        match &mut self.delegate {
            Some(d) => d.load(name),
            None => Ok(None),
        }
    }

    fn exists(&mut self, name: &str) -> PersistResult<bool> {
        match &mut self.delegate {
            Some(d) => d.exists(name),
            None => Ok(false),
        }
    }

    fn dump(&mut self, name: &str, value: &V) -> PersistResult<()> {
        match &mut self.delegate {
            Some(d) => d.dump(name, value),
            None => Ok(()),
        }
    }

    fn delete(&mut self, name: &str) -> PersistResult<()> {
        match &mut self.delegate {
            Some(d) => d.delete(name),
            None => Ok(()),
        }
    }

    fn keys(&mut self) -> PersistResult<Vec<String>> {
        match &mut self.delegate {
            Some(d) => d.keys(),
            None => Ok(Vec::new()),
        }
    }

    fn clear(&mut self) -> PersistResult<()> {
        match &mut self.delegate {
            Some(d) => d.clear(),
            None => Ok(()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  KeyLimitStash
// ═══════════════════════════════════════════════════════════════════════

/// Reports at most `limit` of the delegate's keys.
///
/// Only `keys` (and the helpers built on it) are affected.
#[derive(Debug)]
pub struct KeyLimitStash<S> {
    delegate: S,
    limit: usize,
}

impl<S> KeyLimitStash<S> {
    pub fn new(delegate: S, limit: usize) -> Self {
        Self { delegate, limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl<V, S: Stash<V>> Stash<V> for KeyLimitStash<S> {
    fn load(&mut self, name: &str) -> PersistResult<Option<V>> {
        self.delegate.load(name)
    }

    fn exists(&mut self, name: &str) -> PersistResult<bool> {
        self.delegate.exists(name)
    }

    fn dump(&mut self, name: &str, value: &V) -> PersistResult<()> {
        self.delegate.dump(name, value)
    }

    fn delete(&mut self, name: &str) -> PersistResult<()> {
        self.delegate.delete(name)
    }

    fn keys(&mut self) -> PersistResult<Vec<String>> {
        let mut keys = self.delegate.keys()?;
        keys.truncate(self.limit);
        Ok(keys)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  PreemptiveStash
// ═══════════════════════════════════════════════════════════════════════

/// A delegate plus a memoized "does it hold anything" check.
///
/// The check runs once and is cached until [`reset_has_data`] or a write
/// through this stash.
///
/// [`reset_has_data`]: PreemptiveStash::reset_has_data
#[derive(Debug)]
pub struct PreemptiveStash<S> {
    delegate: S,
    has_data: PersistedWork<bool>,
}

impl<S> PreemptiveStash<S> {
    pub fn new(delegate: S) -> Self {
        Self {
            delegate,
            has_data: persisted("has_data").owner::<Self>().build(),
        }
    }

    pub fn delegate_mut(&mut self) -> &mut S {
        &mut self.delegate
    }

    /// Forget the cached check so the next call re-inspects the delegate.
    pub fn reset_has_data(&mut self) -> PersistResult<()> {
        self.has_data.clear()
    }
}

impl<S> PreemptiveStash<S> {
    /// Whether the delegate yields at least one key.
    pub fn has_data<V>(&mut self) -> PersistResult<bool>
    where
        S: Stash<V>,
    {
        let delegate = &mut self.delegate;
        self.has_data
            .get_with(|| Ok(!Stash::<V>::keys(delegate)?.is_empty()))
    }
}

impl<V, S: Stash<V>> Stash<V> for PreemptiveStash<S> {
    fn load(&mut self, name: &str) -> PersistResult<Option<V>> {
        self.delegate.load(name)
    }

    fn exists(&mut self, name: &str) -> PersistResult<bool> {
        self.delegate.exists(name)
    }

    fn dump(&mut self, name: &str, value: &V) -> PersistResult<()> {
        self.delegate.dump(name, value)?;
        self.reset_has_data()
    }

    fn delete(&mut self, name: &str) -> PersistResult<()> {
        self.delegate.delete(name)?;
        self.reset_has_data()
    }

    fn keys(&mut self) -> PersistResult<Vec<String>> {
        self.delegate.keys()
    }

    fn clear(&mut self) -> PersistResult<()> {
        self.delegate.clear()?;
        self.reset_has_data()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  FactoryStash
// ═══════════════════════════════════════════════════════════════════════

/// Serves keys and values from `factory` until the delegate has data.
///
/// A load the delegate cannot satisfy is produced by the factory and
/// written to the delegate, which then becomes the source of truth.
///
/// ```rust
/// # use confstash_persist::{DictionaryStash, FactoryStash, Stash};
/// let mut factory = DictionaryStash::new();
/// factory.dump("a", &1_u32).unwrap();
/// factory.dump("b", &2_u32).unwrap();
///
/// let mut stash = FactoryStash::new(DictionaryStash::<u32>::new(), factory);
/// assert_eq!(stash.keys().unwrap().len(), 2);
///
/// assert_eq!(stash.load("a").unwrap(), Some(1));
/// assert_eq!(stash.keys().unwrap(), vec!["a".to_string()]);
/// ```
#[derive(Debug)]
pub struct FactoryStash<S, F> {
    preemptive: PreemptiveStash<S>,
    factory: F,
}

impl<S, F> FactoryStash<S, F> {
    /// Persist into `delegate`, falling back to `factory`.
    pub fn new(delegate: S, factory: F) -> Self {
        Self {
            preemptive: PreemptiveStash::new(delegate),
            factory,
        }
    }

    pub fn delegate_mut(&mut self) -> &mut S {
        self.preemptive.delegate_mut()
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    pub fn reset_has_data(&mut self) -> PersistResult<()> {
        self.preemptive.reset_has_data()
    }

    /// Whether the delegate has data, which decides the key source.
    pub fn has_data<V>(&mut self) -> PersistResult<bool>
    where
        S: Stash<V>,
    {
        self.preemptive.has_data::<V>()
    }
}

impl<V, S, F> Stash<V> for FactoryStash<S, F>
where
    S: Stash<V>,
    F: Stash<V>,
{
    fn load(&mut self, name: &str) -> PersistResult<Option<V>> {
        if Stash::<V>::exists(&mut self.preemptive, name)? {
            return self.preemptive.load(name);
        }
        self.preemptive.reset_has_data()?;
        let value = self.factory.load(name)?;
        if let Some(value) = &value {
            info!(key = name, "populating delegate from factory");
            self.preemptive.dump(name, value)?;
        }
        Ok(value)
    }

    fn exists(&mut self, name: &str) -> PersistResult<bool> {
        Ok(Stash::<V>::exists(&mut self.preemptive, name)? || self.factory.exists(name)?)
    }

    fn dump(&mut self, name: &str, value: &V) -> PersistResult<()> {
        self.preemptive.dump(name, value)
    }

    fn delete(&mut self, name: &str) -> PersistResult<()> {
        self.preemptive.delete(name)
    }

    fn keys(&mut self) -> PersistResult<Vec<String>> {
        if self.preemptive.has_data::<V>()? {
            debug!("keys from delegate");
            Stash::<V>::keys(&mut self.preemptive)
        } else {
            debug!("keys from factory");
            self.factory.keys()
        }
    }

    fn clear(&mut self) -> PersistResult<()> {
        Stash::<V>::clear(&mut self.preemptive)
    }
}

// ── tests ────────────────────────────────────────────────────────────
