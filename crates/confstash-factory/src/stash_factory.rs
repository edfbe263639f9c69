//! Stash graphs declared in configuration.
//!
//! ```ini
//! [data]
//! class_name = DirectoryStash
//! create_path = /var/cache/app
//!
//! [lazy]
//! class_name = FactoryStash
//! delegate = data
//! factory = source
//! ```
//!
//! Composite stashes name their parts by instance name; each part is built
//! through the same factory, so parts can be composites themselves.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use confstash_config::{Config, Params};
use confstash_persist::{
    CacheStash, DelegateStash, DictionaryStash, DirectoryStash, FactoryStash, KeyLimitStash,
    PreemptiveStash, ShelveStash, Stash,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{FactoryError, FactoryResult};
use crate::factory::{ConfigFactory, InstanceArgs, Instantiate};

/// A type-erased stash, as built by a [`StashFactory`].
pub type BoxedStash<V> = Box<dyn Stash<V> + Send>;

fn boxed<V, S>(stash: S) -> BoxedStash<V>
where
    S: Stash<V> + Send + 'static,
{
    Box::new(stash)
}

// ── leaf stashes ─────────────────────────────────────────────────────

impl<V> Instantiate for DirectoryStash<V> {
    fn instantiate(args: InstanceArgs) -> FactoryResult<Self> {
        let create_path = args.require_str("create_path")?;
        match args.get("pattern").and_then(Value::as_str) {
            Some(pattern) => Ok(DirectoryStash::with_pattern(create_path, pattern)?),
            None => Ok(DirectoryStash::new(create_path)),
        }
    }
}

impl<V> Instantiate for ShelveStash<V> {
    fn instantiate(args: InstanceArgs) -> FactoryResult<Self> {
        let create_path = args.require_str("create_path")?;
        let writeback = args
            .get("writeback")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(ShelveStash::with_writeback(create_path, writeback))
    }
}

impl<V> Instantiate for DictionaryStash<V> {
    fn instantiate(_args: InstanceArgs) -> FactoryResult<Self> {
        Ok(DictionaryStash::new())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  StashFactory
// ═══════════════════════════════════════════════════════════════════════

/// A [`ConfigFactory`] of boxed stashes with every built-in stash type
/// registered.
///
/// Register additional stash types through `Deref` with
/// [`ConfigFactory::register_into`] or [`ConfigFactory::register_fn`].
#[derive(Debug)]
pub struct StashFactory<V> {
    factory: ConfigFactory<BoxedStash<V>>,
}

impl<V> StashFactory<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(config: impl Into<Arc<Config>>) -> Self {
        let mut factory = ConfigFactory::new(config);
        register_builtins(&mut factory);
        Self { factory }
    }

    pub fn with_pattern(self, pattern: impl Into<String>) -> Self {
        Self {
            factory: self.factory.with_pattern(pattern),
        }
    }

    /// Build the stash declared for instance `name`.
    pub fn stash(&self, name: &str) -> FactoryResult<BoxedStash<V>> {
        self.factory.instance(name, Params::new())
    }

    pub fn into_inner(self) -> ConfigFactory<BoxedStash<V>> {
        self.factory
    }
}

impl<V> Deref for StashFactory<V> {
    type Target = ConfigFactory<BoxedStash<V>>;

    fn deref(&self) -> &Self::Target {
        &self.factory
    }
}

impl<V> DerefMut for StashFactory<V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.factory
    }
}

fn register_builtins<V>(factory: &mut ConfigFactory<BoxedStash<V>>)
where
    V: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    factory
        .register_into::<DirectoryStash<V>, _>("DirectoryStash", boxed)
        .register_into::<ShelveStash<V>, _>("ShelveStash", boxed)
        .register_into::<DictionaryStash<V>, _>("DictionaryStash", boxed)
        .register_fn("FactoryStash", |factory, args| {
            let delegate = part(factory, &args, "delegate")?;
            let source = part(factory, &args, "factory")?;
            Ok(boxed(FactoryStash::new(delegate, source)))
        })
        .register_fn("CacheStash", |factory, args| {
            let delegate = part(factory, &args, "delegate")?;
            Ok(boxed(
                CacheStash::<BoxedStash<V>, DictionaryStash<V>>::new(delegate),
            ))
        })
        .register_fn("PreemptiveStash", |factory, args| {
            let delegate = part(factory, &args, "delegate")?;
            Ok(boxed(PreemptiveStash::new(delegate)))
        })
        .register_fn("KeyLimitStash", |factory, args| {
            let delegate = part(factory, &args, "delegate")?;
            let limit = args
                .get("limit")
                .and_then(Value::as_u64)
                .ok_or_else(|| FactoryError::InvalidParams {
                    name: args.name().unwrap_or_default().to_string(),
                    reason: "`limit` must be a non-negative integer".to_string(),
                })?;
            Ok(boxed(KeyLimitStash::new(delegate, limit as usize)))
        })
        .register_fn("DelegateStash", |factory, args| {
            let stash = match args.get("delegate") {
                Some(_) => DelegateStash::new(part(factory, &args, "delegate")?),
                None => DelegateStash::empty(),
            };
            Ok(boxed(stash))
        });
}

/// Build the stash named by option `option` of a composite.
fn part<V>(
    factory: &ConfigFactory<BoxedStash<V>>,
    args: &InstanceArgs,
    option: &str,
) -> FactoryResult<BoxedStash<V>>
where
    V: 'static,
{
    let name = args.require_str(option)?;
    debug!(option, part = name, "building stash part");
    factory.nested_instance(name, args, Params::new())
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use confstash_persist::PersistResult;

    /// Squares of `0..n`, keyed by their root.
    struct SquaresStash {
        n: u64,
    }

    impl Stash<u64> for SquaresStash {
        fn load(&mut self, name: &str) -> PersistResult<Option<u64>> {
            Ok(name.parse::<u64>().ok().filter(|i| *i < self.n).map(|i| i * i))
        }

        fn dump(&mut self, _name: &str, _value: &u64) -> PersistResult<()> {
            Ok(())
        }

        fn delete(&mut self, _name: &str) -> PersistResult<()> {
            Ok(())
        }

        fn keys(&mut self) -> PersistResult<Vec<String>> {
            Ok((0..self.n).map(|i| i.to_string()).collect())
        }
    }

    fn factory(conf: &str) -> StashFactory<u64> {
        let config = Config::from_ini_str(conf).unwrap();
        let mut factory = StashFactory::new(config);
        factory.register_fn("SquaresStash", |_, args| {
            let n = args.get("n").and_then(Value::as_u64).unwrap_or(0);
            Ok(boxed(SquaresStash { n }))
        });
        factory
    }

    #[test]
    fn builtins_are_registered() {
        let factory = factory("");
        assert_eq!(
            factory.class_names(),
            vec![
                "CacheStash",
                "DelegateStash",
                "DictionaryStash",
                "DirectoryStash",
                "FactoryStash",
                "KeyLimitStash",
                "PreemptiveStash",
                "ShelveStash",
                "SquaresStash",
            ]
        );
    }

    #[test]
    fn factory_stash_graph_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let conf = format!(
            "[data]\nclass_name = DirectoryStash\ncreate_path = {}\npattern = sq_{{name}}.json\n\n\
             [squares]\nclass_name = SquaresStash\nn = 6\n\n\
             [lazy]\nclass_name = FactoryStash\ndelegate = data\nfactory = squares\n",
            dir.path().display()
        );
        let mut stash = factory(&conf).stash("lazy").unwrap();
        assert_eq!(stash.keys().unwrap().len(), 6);
        assert_eq!(stash.load("4").unwrap(), Some(16));
        assert!(dir.path().join("sq_4.json").is_file());
        assert_eq!(stash.keys().unwrap(), vec!["4"]);
    }

    #[test]
    fn key_limit_and_cache() {
        let conf = "\
[squares]
class_name = SquaresStash
n = 10

[sample]
class_name = KeyLimitStash
delegate = squares
limit = 3

[cached]
class_name = CacheStash
delegate = squares
";
        let factory = factory(conf);
        let mut sample = factory.stash("sample").unwrap();
        assert_eq!(sample.keys().unwrap(), vec!["0", "1", "2"]);

        let mut cached = factory.stash("cached").unwrap();
        assert_eq!(cached.load("9").unwrap(), Some(81));
        assert!(cached.exists("9").unwrap());
    }

    #[test]
    fn delegate_stash_without_delegate_is_null() {
        let factory = factory("[null]\nclass_name = DelegateStash\n");
        let mut stash = factory.stash("null").unwrap();
        stash.dump("a", &1).unwrap();
        assert!(!stash.exists("a").unwrap());
        assert!(stash.keys().unwrap().is_empty());
    }

    #[test]
    fn shelve_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let conf = format!(
            "[shelf]\nclass_name = ShelveStash\ncreate_path = {}\nwriteback = True\n",
            dir.path().join("shelf.db").display()
        );
        let mut stash = factory(&conf).stash("shelf").unwrap();
        stash.dump("k", &5).unwrap();
        assert_eq!(stash.load("k").unwrap(), Some(5));
        drop(stash);

        let mut again = factory(&conf).stash("shelf").unwrap();
        assert_eq!(again.load("k").unwrap(), Some(5));
    }

    #[test]
    fn self_reference_is_rejected() {
        let factory = factory("[loop]\nclass_name = PreemptiveStash\ndelegate = loop\n");
        let err = factory.stash("loop").err().unwrap();
        assert!(matches!(err, FactoryError::Construction { .. }));
    }

    #[test]
    fn cycles_are_rejected() {
        let factory = factory(
            "[a]\nclass_name = PreemptiveStash\ndelegate = b\n\n\
             [b]\nclass_name = CacheStash\ndelegate = a\n",
        );
        match factory.stash("a").err() {
            Some(FactoryError::Construction { name, reason }) => {
                assert_eq!(name, "a");
                assert!(reason.contains("a -> b -> a"));
            }
            other => panic!("expected a construction error, got {other:?}"),
        }
    }

    #[test]
    fn shared_parts_are_not_cycles() {
        let factory = factory(
            "[sq]\nclass_name = SquaresStash\nn = 4\n\n\
             [both]\nclass_name = FactoryStash\ndelegate = cached\nfactory = sq\n\n\
             [cached]\nclass_name = CacheStash\ndelegate = sq\n",
        );
        let mut stash = factory.stash("both").unwrap();
        assert_eq!(stash.load("3").unwrap(), Some(9));
    }

    #[test]
    fn missing_part_option_is_reported() {
        let factory = factory("[half]\nclass_name = FactoryStash\ndelegate = half_data\n\n[half_data]\nclass_name = DictionaryStash\n");
        let err = factory.stash("half").err().unwrap();
        assert!(matches!(err, FactoryError::InvalidParams { .. }));
    }

    #[test]
    fn bad_directory_pattern() {
        let factory = factory("[dir]\nclass_name = DirectoryStash\ncreate_path = x\npattern = nope\n");
        let err = factory.stash("dir").err().unwrap();
        assert!(matches!(err, FactoryError::Persist(_)));
    }
}
