//! Identity cache in front of a [`ConfigManager`], backed by [`moka`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use confstash_config::Params;
use confstash_persist::DelegateStash;
use moka::sync::Cache;
use tracing::debug;

use crate::error::FactoryResult;
use crate::factory::ConfigFactory;
use crate::manager::ConfigManager;

// ── stats ────────────────────────────────────────────────────────────

/// Hit and miss counters of a [`CachingConfigFactory`].
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hits={} misses={}", self.hits(), self.misses())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  CachingConfigFactory
// ═══════════════════════════════════════════════════════════════════════

/// Hands out one shared `Arc<T>` per instance name.
///
/// The first `instance` or `load` of a name builds (or loads) the value;
/// later calls return the same `Arc` until the name is evicted or deleted.
pub struct CachingConfigFactory<T> {
    manager: ConfigManager<T>,
    cache: Cache<String, Arc<T>>,
    stats: CacheStats,
}

impl<T> CachingConfigFactory<T>
where
    T: Send + Sync + 'static,
{
    /// An unbounded cache: a name keeps its instance until evicted or
    /// deleted.
    pub fn new(manager: ConfigManager<T>) -> Self {
        Self::from_cache(manager, Cache::builder().build())
    }

    /// Keep at most `max_capacity` instances.
    ///
    /// Once full, the cache drops entries on its own, and a later request
    /// for a dropped name yields a new `Arc`.
    pub fn with_capacity(manager: ConfigManager<T>, max_capacity: u64) -> Self {
        Self::from_cache(manager, Cache::new(max_capacity))
    }

    fn from_cache(manager: ConfigManager<T>, cache: Cache<String, Arc<T>>) -> Self {
        Self {
            manager,
            cache,
            stats: CacheStats::default(),
        }
    }

    /// Cache a bare factory; `dump` and `delete` go nowhere.
    pub fn from_factory(factory: ConfigFactory<T>) -> Self {
        Self::new(ConfigManager::new(factory, DelegateStash::<T>::empty()))
    }

    pub fn manager(&self) -> &ConfigManager<T> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ConfigManager<T> {
        &mut self.manager
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// The cached instance `name`, built from configuration on first use.
    pub fn instance(&self, name: &str) -> FactoryResult<Arc<T>> {
        if let Some(hit) = self.lookup(name) {
            return Ok(hit);
        }
        let inst = Arc::new(self.manager.instance(name, Params::new())?);
        self.cache.insert(name.to_string(), Arc::clone(&inst));
        Ok(inst)
    }

    /// The cached instance `name`, loaded through the manager on first use.
    pub fn load(&mut self, name: &str) -> FactoryResult<Arc<T>> {
        if let Some(hit) = self.lookup(name) {
            return Ok(hit);
        }
        let inst = Arc::new(self.manager.load(name)?);
        self.cache.insert(name.to_string(), Arc::clone(&inst));
        Ok(inst)
    }

    pub fn dump(&mut self, name: &str, inst: &T) -> FactoryResult<()> {
        self.manager.dump(name, inst)
    }

    /// Evict `name` and delete it from the manager's stash. The name is
    /// evicted even when the stash delete fails.
    pub fn delete(&mut self, name: &str) -> FactoryResult<()> {
        self.evict(name);
        self.manager.delete(name)
    }

    pub fn keys(&mut self) -> FactoryResult<Vec<String>> {
        self.manager.keys()
    }

    /// Whether `name` is currently cached.
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    pub fn evict(&self, name: &str) {
        self.cache.invalidate(name);
        debug!(name, "instance evicted");
    }

    pub fn evict_all(&self) {
        self.cache.invalidate_all();
        debug!("all instances evicted");
    }

    fn lookup(&self, name: &str) -> Option<Arc<T>> {
        match self.cache.get(name) {
            Some(hit) => {
                self.stats.record_hit();
                debug!(name, "instance cache hit");
                Some(hit)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }
}

impl<T> fmt::Debug for CachingConfigFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingConfigFactory")
            .field("manager", &self.manager)
            .field("stats", &self.stats.to_string())
            .finish_non_exhaustive()
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{InstanceArgs, Instantiate};
    use confstash_config::Config;
    use confstash_persist::{DictionaryStash, Stash};

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        start: i64,
    }

    impl Instantiate for Counter {
        fn instantiate(args: InstanceArgs) -> FactoryResult<Self> {
            let start = args.get("start").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(Self { start })
        }
    }

    fn factory() -> ConfigFactory<Counter> {
        let config =
            Config::from_ini_str("[a]\nclass_name = Counter\nstart = 1\n\n[b]\nclass_name = Counter\nstart = 2\n")
                .unwrap();
        let mut factory = ConfigFactory::new(config);
        factory.register::<Counter>();
        factory
    }

    #[test]
    fn repeated_name_returns_same_arc() {
        let cf = CachingConfigFactory::from_factory(factory());
        let a1 = cf.instance("a").unwrap();
        let a2 = cf.instance("a").unwrap();
        let b = cf.instance("b").unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(b.start, 2);
        assert_eq!(cf.stats().hits(), 1);
        assert_eq!(cf.stats().misses(), 2);
    }

    #[test]
    fn evict_forces_rebuild() {
        let cf = CachingConfigFactory::from_factory(factory());
        let a1 = cf.instance("a").unwrap();
        cf.evict("a");
        assert!(!cf.is_cached("a"));
        let a2 = cf.instance("a").unwrap();
        assert!(!Arc::ptr_eq(&a1, &a2));
        assert_eq!(*a1, *a2);

        cf.evict_all();
        let a3 = cf.instance("a").unwrap();
        assert!(!Arc::ptr_eq(&a2, &a3));
    }

    #[test]
    fn load_prefers_stash_then_caches() {
        let mut stash = DictionaryStash::new();
        stash.dump("a", &Counter { start: 99 }).unwrap();
        let mut cf = CachingConfigFactory::new(ConfigManager::new(factory(), stash));

        let a1 = cf.load("a").unwrap();
        assert_eq!(a1.start, 99);
        let a2 = cf.load("a").unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));
    }

    #[test]
    fn delete_also_evicts() {
        let mut cf = CachingConfigFactory::new(ConfigManager::new(factory(), DictionaryStash::new()));
        cf.dump("a", &Counter { start: 7 }).unwrap();
        assert_eq!(cf.load("a").unwrap().start, 7);
        assert_eq!(cf.keys().unwrap(), vec!["a"]);

        cf.delete("a").unwrap();
        assert!(!cf.is_cached("a"));
        assert_eq!(cf.load("a").unwrap().start, 1);
    }

    #[test]
    fn failed_delete_still_evicts() {
        let mut cf = CachingConfigFactory::new(ConfigManager::new(factory(), DictionaryStash::new()));
        cf.instance("a").unwrap();
        assert!(cf.is_cached("a"));

        let err = cf.delete("a").unwrap_err();
        assert!(matches!(err, crate::error::FactoryError::Persist(_)));
        assert!(!cf.is_cached("a"));
    }

    #[test]
    fn default_cache_keeps_every_name() {
        let text: String = (0..300)
            .map(|i| format!("[w{i}]\nclass_name = Counter\nstart = {i}\n\n"))
            .collect();
        let mut factory = ConfigFactory::new(Config::from_ini_str(&text).unwrap());
        factory.register::<Counter>();
        let cf = CachingConfigFactory::from_factory(factory);

        let first: Vec<Arc<Counter>> = (0..300)
            .map(|i| cf.instance(&format!("w{i}")).unwrap())
            .collect();
        for (i, inst) in first.iter().enumerate() {
            assert!(Arc::ptr_eq(inst, &cf.instance(&format!("w{i}")).unwrap()));
        }
    }
}
