//! One file per key under a directory.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{PersistError, PersistResult};
use crate::stash::Stash;

/// File name pattern used by [`DirectoryStash::new`].
pub const DEFAULT_PATTERN: &str = "{name}.dat";

const NAME_PLACEHOLDER: &str = "{name}";

static DEFAULT_MATCHER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)\.dat$").expect("valid default pattern regex"));

/// Stores each value as a JSON file named by substituting the key into a
/// pattern such as `{name}.dat`.
///
/// The directory is created on the first write. `keys` lists the
/// directory and recovers keys from file names matching the pattern;
/// anything else in the directory is ignored.
#[derive(Debug, Clone)]
pub struct DirectoryStash<V> {
    create_path: PathBuf,
    pattern: String,
    matcher: Regex,
    _marker: PhantomData<fn() -> V>,
}

impl<V> DirectoryStash<V> {
    /// Store under `create_path` using [`DEFAULT_PATTERN`].
    pub fn new(create_path: impl Into<PathBuf>) -> Self {
        Self {
            create_path: create_path.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            matcher: DEFAULT_MATCHER.clone(),
            _marker: PhantomData,
        }
    }

    /// Store under `create_path` with a custom file name pattern.
    ///
    /// The pattern must contain `{name}` exactly once.
    pub fn with_pattern(create_path: impl Into<PathBuf>, pattern: &str) -> PersistResult<Self> {
        if pattern.matches(NAME_PLACEHOLDER).count() != 1 {
            return Err(PersistError::InvalidArgument(format!(
                "file pattern must contain {NAME_PLACEHOLDER} once: {pattern}"
            )));
        }
        let matcher = build_matcher(pattern)
            .map_err(|e| PersistError::InvalidArgument(format!("file pattern {pattern}: {e}")))?;
        Ok(Self {
            create_path: create_path.into(),
            pattern: pattern.to_string(),
            matcher,
            _marker: PhantomData,
        })
    }

    pub fn create_path(&self) -> &Path {
        &self.create_path
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Path of the file holding `name`.
    ///
    /// Keys must be a single path component; separators and `.`/`..` are
    /// rejected so every file stays inside `create_path`.
    pub fn instance_path(&self, name: &str) -> PersistResult<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(PersistError::InvalidArgument(format!(
                "invalid directory stash key `{name}`"
            )));
        }
        Ok(self
            .create_path
            .join(self.pattern.replace(NAME_PLACEHOLDER, name)))
    }

    fn key_of(&self, file_name: &str) -> Option<String> {
        self.matcher
            .captures(file_name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// `^<prefix>(.+)<suffix>$` with the literal parts escaped.
fn build_matcher(pattern: &str) -> Result<Regex, regex::Error> {
    let (prefix, suffix) = pattern
        .split_once(NAME_PLACEHOLDER)
        .unwrap_or((pattern, ""));
    Regex::new(&format!(
        "^{}(.+){}$",
        regex::escape(prefix),
        regex::escape(suffix)
    ))
}

impl<V> Stash<V> for DirectoryStash<V>
where
    V: Serialize + DeserializeOwned,
{
    fn load(&mut self, name: &str) -> PersistResult<Option<V>> {
        let path = self.instance_path(name)?;
        if !path.exists() {
            debug!(key = name, path = %path.display(), "no instance file");
            return Ok(None);
        }
        info!(path = %path.display(), "loading instance");
        let bytes = std::fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn exists(&mut self, name: &str) -> PersistResult<bool> {
        Ok(self.instance_path(name)?.exists())
    }

    fn dump(&mut self, name: &str, value: &V) -> PersistResult<()> {
        std::fs::create_dir_all(&self.create_path)?;
        let path = self.instance_path(name)?;
        info!(path = %path.display(), "saving instance");
        std::fs::write(&path, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn delete(&mut self, name: &str) -> PersistResult<()> {
        let path = self.instance_path(name)?;
        if path.exists() {
            info!(path = %path.display(), "deleting instance");
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn keys(&mut self) -> PersistResult<Vec<String>> {
        if !self.create_path.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.create_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if let Some(key) = file_name.to_str().and_then(|f| self.key_of(f)) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_load_exists_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut stash = DirectoryStash::new(dir.path().join("store"));
        assert!(!stash.exists("a").unwrap());
        assert!(!dir.path().join("store").exists());

        stash.dump("a", &vec![1_u32, 2]).unwrap();
        assert!(dir.path().join("store/a.dat").is_file());
        assert!(stash.exists("a").unwrap());
        assert_eq!(stash.load("a").unwrap(), Some(vec![1, 2]));

        stash.delete("a").unwrap();
        assert!(!stash.exists("a").unwrap());
        assert_eq!(stash.load("a").unwrap(), None);
    }

    #[test]
    fn keys_cannot_leave_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut stash: DirectoryStash<u32> = DirectoryStash::new(dir.path().join("store"));
        for key in ["../escape", "a/b", "..", ".", ""] {
            assert!(matches!(
                stash.dump(key, &1),
                Err(PersistError::InvalidArgument(_))
            ));
            assert!(stash.load(key).is_err());
        }
        assert!(!dir.path().join("escape.dat").exists());
        assert!(stash.keys().unwrap().is_empty());
    }

    #[test]
    fn delete_missing_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut stash: DirectoryStash<u32> = DirectoryStash::new(dir.path());
        stash.delete("ghost").unwrap();
    }

    #[test]
    fn keys_skip_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut stash = DirectoryStash::with_pattern(dir.path(), "item-{name}.json").unwrap();
        stash.dump("b", &2_u32).unwrap();
        stash.dump("a", &1_u32).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join("item-.json.bak"), "x").unwrap();
        std::fs::create_dir(dir.path().join("item-sub.json")).unwrap();

        assert_eq!(stash.keys().unwrap(), vec!["a", "b"]);
        stash.clear().unwrap();
        assert!(stash.is_empty().unwrap());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn pattern_literals_are_escaped() {
        let stash: DirectoryStash<u32> = DirectoryStash::with_pattern("/tmp", "{name}.dat").unwrap();
        assert_eq!(stash.key_of("x.dat").as_deref(), Some("x"));
        assert_eq!(stash.key_of("xydat"), None);
    }

    #[test]
    fn pattern_requires_placeholder() {
        let err = DirectoryStash::<u32>::with_pattern("/tmp", "fixed.dat").unwrap_err();
        assert!(matches!(err, PersistError::InvalidArgument(_)));
    }

    #[test]
    fn missing_directory_has_no_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut stash: DirectoryStash<u32> = DirectoryStash::new(dir.path().join("absent"));
        assert!(stash.keys().unwrap().is_empty());
    }
}
