//! # confstash-persist
//!
//! Persistence building blocks for confstash.
//!
//! Provides memoized computations cached in memory, in a process-wide
//! registry and on disk, plus a family of composable key-value stashes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  PersistedWork  (owner slot → global → disk) │
//! │  GlobalRegistry (DashMap, process scoped)    │
//! ├─────────────────────────────────────────────┤
//! │  Stash trait + decorators (cache, factory,   │
//! │  preemptive, key limit, delegate)            │
//! │  DictionaryStash │ DirectoryStash │ Shelve   │
//! ├─────────────────────────────────────────────┤
//! │  TaskQueue (crossbeam) │ StashMapReducer     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use confstash_persist::{DirectoryStash, FactoryStash, Stash, persisted};
//!
//! let mut stash = FactoryStash::new(DirectoryStash::new("target/stash"), source);
//! let value = stash.load("a")?;
//!
//! let mut total = persisted("total").path("target/total.dat").build::<u64>();
//! let n = total.get_with(|| Ok(expensive()))?;
//! ```

pub mod container;
pub mod error;
pub mod global;
pub mod multi;
pub mod stash;
pub mod task;
pub mod timing;
pub mod work;

// ── re-exports ───────────────────────────────────────────────────────

pub use container::PersistableContainer;
pub use error::{PersistError, PersistResult};
pub use global::GlobalRegistry;
pub use multi::StashMapReducer;
pub use stash::{
    CacheStash, DelegateStash, DictionaryStash, DirectoryStash, FactoryStash, KeyLimitStash,
    PreemptiveStash, SharedStash, ShelveStash, Stash,
};
pub use task::{Chunks, Job, TaskQueue, TaskQueueState, chunks};
pub use timing::Timer;
pub use work::{Persistable, PersistedBuilder, PersistedWork, Worker, persisted};
