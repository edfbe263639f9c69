//! Memoized work with memory, global and disk cache layers.
//!
//! A [`PersistedWork`] holds a single lazily computed value. On every
//! [`get`](PersistedWork::get) it looks, in order:
//!
//! 1. in its own (owner scoped) slot,
//! 2. in the [`GlobalRegistry`] when global caching is enabled,
//! 3. on disk when a path is configured, computing and writing the file if
//!    it does not exist yet,
//! 4. otherwise it runs the worker.
//!
//! Whatever layer produced the value, it is then stored in the owner slot
//! (and the global slot). [`clear`](PersistedWork::clear) resets all three
//! layers.
//!
//! Owners keep the cell as a field and expose an accessor:
//!
//! ```rust
//! use confstash_persist::{persisted, PersistedWork, PersistResult};
//!
//! struct Squares {
//!     n: u64,
//!     total: PersistedWork<u64>,
//! }
//!
//! impl Squares {
//!     fn new(n: u64) -> Self {
//!         Self { n, total: persisted("total").owner::<Self>().build() }
//!     }
//!
//!     fn total(&mut self) -> PersistResult<u64> {
//!         self.total.get_with(|| Ok((1..=self.n).map(|i| i * i).sum()))
//!     }
//! }
//!
//! let mut sq = Squares::new(3);
//! assert_eq!(sq.total().unwrap(), 14);
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::{PersistError, PersistResult};
use crate::global::GlobalRegistry;
use crate::timing::Timer;

/// Boxed worker attached to a cell for use by [`PersistedWork::get`].
pub type Worker<T> = Box<dyn FnMut() -> PersistResult<T> + Send>;

/// Bounds every memoized value must satisfy.
pub trait Persistable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Persistable for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

// ── builder ──────────────────────────────────────────────────────────

/// Start configuring a [`PersistedWork`] named `name`.
///
/// The name identifies the cell in memory-only mode; with
/// [`PersistedBuilder::path`] the identity is derived from the path instead.
pub fn persisted(name: impl Into<String>) -> PersistedBuilder {
    PersistedBuilder {
        name: name.into(),
        path: None,
        owner: None,
        globals: None,
        transient: false,
    }
}

/// Builder for [`PersistedWork`].
#[derive(Debug, Clone)]
pub struct PersistedBuilder {
    name: String,
    path: Option<PathBuf>,
    owner: Option<&'static str>,
    globals: Option<GlobalRegistry>,
    transient: bool,
}

impl PersistedBuilder {
    /// Cache the value on disk at `path`.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Scope the identity key to the owning type `O`.
    pub fn owner<O: ?Sized>(mut self) -> Self {
        self.owner = Some(std::any::type_name::<O>());
        self
    }

    /// Share the value through `registry` across every owner of the same key.
    pub fn cache_global(mut self, registry: GlobalRegistry) -> Self {
        self.globals = Some(registry);
        self
    }

    /// Drop the cached value when the owner is serialized.
    pub fn transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    /// Build a cell without an attached worker.
    pub fn build<T>(self) -> PersistedWork<T> {
        let fname = match &self.path {
            Some(path) => sanitize(path),
            None => self.name.clone(),
        };
        let key = match self.owner {
            Some(owner) => format!("_{owner}_{fname}_pwvinst"),
            None => format!("_{fname}_pwvinst"),
        };
        debug!(key = %key, global = self.globals.is_some(), "persisted work created");
        PersistedWork {
            key,
            path: self.path,
            cache_global: self.globals.is_some(),
            transient: self.transient,
            value: None,
            worker: None,
            globals: self.globals,
        }
    }

    /// Build a cell whose [`PersistedWork::get`] runs `worker`.
    pub fn build_with<T, F>(self, worker: F) -> PersistedWork<T>
    where
        F: FnMut() -> PersistResult<T> + Send + 'static,
    {
        let mut work = self.build();
        work.worker = Some(Box::new(worker));
        work
    }
}

/// Absolute path with separators and dots replaced by `_`.
fn sanitize(path: &Path) -> String {
    let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    abs.to_string_lossy()
        .chars()
        .map(|c| if matches!(c, ' ' | '/' | '\\' | '.') { '_' } else { c })
        .collect()
}

// ── cell ─────────────────────────────────────────────────────────────

/// A single memoized value. See the [module docs](self).
pub struct PersistedWork<T> {
    key: String,
    path: Option<PathBuf>,
    cache_global: bool,
    transient: bool,
    value: Option<T>,
    worker: Option<Worker<T>>,
    globals: Option<GlobalRegistry>,
}

impl<T: Persistable> PersistedWork<T> {
    /// Return the cached value, computing it with the attached worker.
    ///
    /// Fails with [`PersistError::MissingWorker`] if the value must be
    /// computed and no worker is attached.
    pub fn get(&mut self) -> PersistResult<T> {
        let mut worker = self.worker.take();
        let key = self.key.clone();
        let result = self.get_with(|| match worker.as_mut() {
            Some(w) => w(),
            None => Err(PersistError::MissingWorker { key }),
        });
        self.worker = worker;
        result
    }

    /// Return the cached value, computing it with `worker` on a miss.
    pub fn get_with<F>(&mut self, worker: F) -> PersistResult<T>
    where
        F: FnOnce() -> PersistResult<T>,
    {
        if let Some(value) = &self.value {
            debug!(key = %self.key, "found in instance");
            return Ok(value.clone());
        }

        if self.cache_global {
            if let Some(value) = self.globals.as_ref().and_then(|g| g.get::<T>(&self.key)) {
                debug!(key = %self.key, "found in globals");
                self.set(value.clone());
                return Ok(value);
            }
        }

        let value = match &self.path {
            Some(path) => Self::load_or_create(&self.key, path, worker)?,
            None => Self::do_work(&self.key, worker)?,
        };
        self.set(value.clone());
        Ok(value)
    }

    /// Replace the in-memory value, seeding the global slot if it is empty.
    pub fn set(&mut self, value: T) {
        debug!(key = %self.key, "saving in memory value");
        if self.cache_global {
            if let Some(globals) = &self.globals {
                globals.insert_if_absent(&self.key, value.clone());
            }
        }
        self.value = Some(value);
    }

    /// Forget the value in every layer so the next access recomputes it.
    pub fn clear(&mut self) -> PersistResult<()> {
        if let Some(path) = &self.path {
            if path.exists() {
                debug!(key = %self.key, path = %path.display(), "deleting cached work");
                std::fs::remove_file(path)?;
            }
        }
        if self.value.take().is_some() {
            debug!(key = %self.key, "removing instance value");
        }
        if let Some(globals) = &self.globals {
            globals.remove(&self.key);
        }
        Ok(())
    }

    fn load_or_create<F>(key: &str, path: &Path, worker: F) -> PersistResult<T>
    where
        F: FnOnce() -> PersistResult<T>,
    {
        if path.exists() {
            debug!(key, path = %path.display(), "loading work");
            let bytes = std::fs::read(path)?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let value = Self::do_work(key, worker)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec(&value)?)?;
        debug!(key, path = %path.display(), "saved work");
        Ok(value)
    }

    fn do_work<F>(key: &str, worker: F) -> PersistResult<T>
    where
        F: FnOnce() -> PersistResult<T>,
    {
        let timer = Timer::with_level(format!("{key}: created work"), tracing::Level::DEBUG);
        match worker() {
            Ok(value) => {
                timer.finish();
                Ok(value)
            }
            Err(e) => {
                timer.cancel();
                Err(e)
            }
        }
    }
}

impl<T> PersistedWork<T> {
    /// Identity key of this cell.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Backing file, when disk caching is enabled.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the owner slot currently holds a value.
    pub fn is_cached(&self) -> bool {
        self.value.is_some()
    }

    /// Whether the value is dropped on serialization.
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Whether the cell was configured for global caching.
    pub fn is_global(&self) -> bool {
        self.cache_global
    }

    /// Attach (or replace) the worker used by [`PersistedWork::get`].
    pub fn attach_worker<F>(&mut self, worker: F)
    where
        F: FnMut() -> PersistResult<T> + Send + 'static,
    {
        self.worker = Some(Box::new(worker));
    }

    /// Re-attach the global registry after deserialization.
    pub fn attach_globals(&mut self, registry: GlobalRegistry) {
        self.globals = Some(registry);
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistedWork<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedWork")
            .field("key", &self.key)
            .field("path", &self.path)
            .field("cache_global", &self.cache_global)
            .field("transient", &self.transient)
            .field("value", &self.value)
            .field("worker", &self.worker.is_some())
            .finish()
    }
}

// ── serialization ────────────────────────────────────────────────────

#[derive(Serialize)]
struct WorkStateRef<'a, T> {
    key: &'a str,
    path: Option<&'a Path>,
    cache_global: bool,
    transient: bool,
    value: Option<&'a T>,
}

#[derive(Deserialize)]
struct WorkState<T> {
    key: String,
    path: Option<PathBuf>,
    cache_global: bool,
    transient: bool,
    value: Option<T>,
}

/// The worker and registry are never written; transient cells also drop
/// their value.
impl<T: Serialize> Serialize for PersistedWork<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WorkStateRef {
            key: &self.key,
            path: self.path.as_deref(),
            cache_global: self.cache_global,
            transient: self.transient,
            value: if self.transient { None } else { self.value.as_ref() },
        }
        .serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for PersistedWork<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let state = WorkState::<T>::deserialize(deserializer)?;
        Ok(Self {
            key: state.key,
            path: state.path,
            cache_global: state.cache_global,
            transient: state.transient,
            value: state.value,
            worker: None,
            globals: None,
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────
