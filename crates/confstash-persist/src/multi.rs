//! Parallel map over the entries of a shared stash.

use std::sync::Arc;

use tracing::debug;

use crate::error::PersistResult;
use crate::stash::{SharedStash, Stash};
use crate::task::TaskQueue;
use crate::timing::Timer;

/// Splits a stash's keys into one group per worker and maps every
/// `(key, value)` pair on a [`TaskQueue`].
///
/// ```rust
/// # use confstash_persist::{DictionaryStash, SharedStash, Stash, StashMapReducer};
/// let mut stash = DictionaryStash::new();
/// for i in 0..10_u64 {
///     stash.dump(&i.to_string(), &i).unwrap();
/// }
/// let mr = StashMapReducer::new(SharedStash::new(stash), 3);
/// let sums = mr
///     .map_reduce(|_, v: u64| Ok(v * 2), |group| group.into_iter().sum::<u64>())
///     .unwrap();
/// assert_eq!(sums.iter().sum::<u64>(), 90);
/// ```
pub struct StashMapReducer<S> {
    stash: SharedStash<S>,
    n_workers: usize,
}

impl<S> StashMapReducer<S> {
    /// Map over `stash` with `n_workers` threads (at least one).
    pub fn new(stash: SharedStash<S>, n_workers: usize) -> Self {
        Self {
            stash,
            n_workers: n_workers.max(1),
        }
    }

    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    pub fn stash(&self) -> &SharedStash<S> {
        &self.stash
    }

    /// `ceil(len / n_workers)`, at least one.
    pub fn key_group_size<V>(&self) -> PersistResult<usize>
    where
        S: Stash<V>,
    {
        let n_items = Stash::<V>::len(&mut *self.stash.lock()?)?;
        Ok(n_items.div_ceil(self.n_workers).max(1))
    }

    /// Apply `mapper` to every entry; one result vector per key group, in
    /// key group order.
    pub fn map<V, T, M>(&self, mapper: M) -> PersistResult<Vec<Vec<T>>>
    where
        S: Stash<V> + Send + 'static,
        V: 'static,
        T: Send + 'static,
        M: Fn(&str, V) -> PersistResult<T> + Send + Sync + 'static,
    {
        let size = self.key_group_size::<V>()?;
        let groups = Stash::<V>::key_groups(&mut *self.stash.lock()?, size)?;
        let timer = Timer::with_level(
            format!("mapped {} key groups", groups.len()),
            tracing::Level::DEBUG,
        );
        debug!(groups = groups.len(), size, "mapping key groups");

        let mapper = Arc::new(mapper);
        let mut queue = TaskQueue::new(self.n_workers);
        for (index, group) in groups.into_iter().enumerate() {
            let stash = self.stash.clone();
            let mapper = Arc::clone(&mapper);
            queue.add_task(move || {
                let mut mapped = Vec::with_capacity(group.len());
                for key in group {
                    let value = Stash::<V>::load(&mut *stash.lock()?, &key)?;
                    if let Some(value) = value {
                        mapped.push(mapper(&key, value)?);
                    }
                }
                Ok((index, mapped))
            })?;
        }

        let mut results = queue.stop()?;
        results.sort_by_key(|(index, _)| *index);
        timer.finish();
        Ok(results.into_iter().map(|(_, mapped)| mapped).collect())
    }

    /// [`map`](Self::map), then `reduce` each group's results.
    pub fn map_reduce<V, T, U, M, F>(&self, mapper: M, reduce: F) -> PersistResult<Vec<U>>
    where
        S: Stash<V> + Send + 'static,
        V: 'static,
        T: Send + 'static,
        M: Fn(&str, V) -> PersistResult<T> + Send + Sync + 'static,
        F: FnMut(Vec<T>) -> U,
    {
        Ok(self.map(mapper)?.into_iter().map(reduce).collect())
    }
}

// ── tests ────────────────────────────────────────────────────────────
