//! A single-file persistent stash on SQLite.
//!
//! Values are stored as JSON text in one table:
//!
//! ```sql
//! CREATE TABLE stash (key TEXT PRIMARY KEY, value TEXT NOT NULL)
//! ```
//!
//! The connection is opened on first use and stays open until
//! [`ShelveStash::close`] or drop. With writeback enabled, dumps are held
//! in memory and written in a single transaction on
//! [`ShelveStash::sync`] or close, so a stash must be closed (or dropped)
//! for those writes to reach the file. [`ShelveStash::scoped`] closes on
//! every exit path.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::error::PersistResult;
use crate::stash::Stash;

const CREATE_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS stash (key TEXT PRIMARY KEY, value TEXT NOT NULL)";

const UPSERT: &str = "INSERT INTO stash (key, value) VALUES (?1, ?2) \
                      ON CONFLICT(key) DO UPDATE SET value = excluded.value";

/// Persistent stash backed by a SQLite file at `create_path`.
pub struct ShelveStash<V> {
    create_path: PathBuf,
    writeback: bool,
    conn: Option<Connection>,
    /// Serialized values waiting for [`ShelveStash::sync`].
    pending: BTreeMap<String, String>,
    _marker: PhantomData<fn() -> V>,
}

impl<V> ShelveStash<V> {
    /// A stash writing through to the file on every dump.
    pub fn new(create_path: impl Into<PathBuf>) -> Self {
        Self::with_writeback(create_path, false)
    }

    /// A stash that buffers dumps until sync or close when `writeback` is set.
    pub fn with_writeback(create_path: impl Into<PathBuf>, writeback: bool) -> Self {
        Self {
            create_path: create_path.into(),
            writeback,
            conn: None,
            pending: BTreeMap::new(),
            _marker: PhantomData,
        }
    }

    /// Open a stash, run `f` against it and close it whether or not `f`
    /// succeeded.
    ///
    /// The error from `f` wins over an error from closing.
    pub fn scoped<R, F>(create_path: impl Into<PathBuf>, f: F) -> PersistResult<R>
    where
        F: FnOnce(&mut Self) -> PersistResult<R>,
    {
        let mut stash = Self::new(create_path);
        let result = f(&mut stash);
        let closed = stash.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    pub fn create_path(&self) -> &Path {
        &self.create_path
    }

    pub fn is_writeback(&self) -> bool {
        self.writeback
    }

    /// Whether the backing connection is currently open.
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Write buffered values to the file.
    ///
    /// The buffer is kept when the flush fails, so a later `sync` or
    /// `close` can retry.
    pub fn sync(&mut self) -> PersistResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        match self.flush(&pending) {
            Ok(()) => {
                debug!(count = pending.len(), "flushed writeback buffer");
                Ok(())
            }
            Err(e) => {
                warn!(count = pending.len(), error = %e, "writeback flush failed, keeping buffer");
                self.pending = pending;
                Err(e)
            }
        }
    }

    fn flush(&mut self, pending: &BTreeMap<String, String>) -> PersistResult<()> {
        let tx = self.conn()?.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT)?;
            for (key, value) in pending {
                stmt.execute(rusqlite::params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Flush and release the file handle. The stash reopens on next use.
    pub fn close(&mut self) -> PersistResult<()> {
        self.sync()?;
        if let Some(conn) = self.conn.take() {
            info!(path = %self.create_path.display(), "closing shelve");
            conn.close().map_err(|(_, e)| e)?;
        }
        Ok(())
    }

    /// Close the stash and remove its file and SQLite siblings, dropping
    /// any buffered writes.
    pub fn delete_all(&mut self) -> PersistResult<()> {
        self.pending.clear();
        self.close()?;
        for path in self.backing_files() {
            if path.exists() {
                debug!(path = %path.display(), "removing shelve file");
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn backing_files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.create_path.clone()];
        for suffix in ["-wal", "-shm"] {
            let mut name = self.create_path.clone().into_os_string();
            name.push(suffix);
            files.push(PathBuf::from(name));
        }
        files
    }

    fn conn(&mut self) -> PersistResult<&mut Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.open()?,
        };
        Ok(self.conn.insert(conn))
    }

    fn open(&self) -> PersistResult<Connection> {
        if let Some(parent) = self.create_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %self.create_path.display(), "opening shelve");
        let conn = Connection::open(&self.create_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute(CREATE_TABLE, [])?;
        Ok(conn)
    }

    fn load_raw(&mut self, name: &str) -> PersistResult<Option<String>> {
        if let Some(value) = self.pending.get(name) {
            return Ok(Some(value.clone()));
        }
        let result = self.conn()?.query_row(
            "SELECT value FROM stash WHERE key = ?1",
            rusqlite::params![name],
            |row| row.get(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl<V> Stash<V> for ShelveStash<V>
where
    V: Serialize + DeserializeOwned,
{
    #[instrument(skip(self))]
    fn load(&mut self, name: &str) -> PersistResult<Option<V>> {
        match self.load_raw(name)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn exists(&mut self, name: &str) -> PersistResult<bool> {
        Ok(self.load_raw(name)?.is_some())
    }

    #[instrument(skip(self, value))]
    fn dump(&mut self, name: &str, value: &V) -> PersistResult<()> {
        let raw = serde_json::to_string(value)?;
        if self.writeback {
            self.pending.insert(name.to_string(), raw);
        } else {
            self.conn()?.execute(UPSERT, rusqlite::params![name, raw])?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete(&mut self, name: &str) -> PersistResult<()> {
        self.pending.remove(name);
        self.conn()?
            .execute("DELETE FROM stash WHERE key = ?1", rusqlite::params![name])?;
        Ok(())
    }

    fn keys(&mut self) -> PersistResult<Vec<String>> {
        let pending: Vec<String> = self.pending.keys().cloned().collect();
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT key FROM stash ORDER BY key")?;
        let mut keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        keys.extend(pending);
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn clear(&mut self) -> PersistResult<()> {
        self.pending.clear();
        self.conn()?.execute("DELETE FROM stash", [])?;
        Ok(())
    }
}

impl<V> Drop for ShelveStash<V> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.create_path.display(), error = %e, "failed to close shelve");
        }
    }
}

impl<V> std::fmt::Debug for ShelveStash<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShelveStash")
            .field("create_path", &self.create_path)
            .field("writeback", &self.writeback)
            .field("open", &self.conn.is_some())
            .field("pending", &self.pending.len())
            .finish()
    }
}

// ── tests ────────────────────────────────────────────────────────────
