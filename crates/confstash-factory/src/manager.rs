//! A factory whose instances can be persisted in a stash.

use std::fmt;
use std::ops::{Deref, DerefMut};

use confstash_config::Params;
use confstash_persist::Stash;
use tracing::debug;

use crate::error::FactoryResult;
use crate::factory::{ConfigFactory, DEFAULT_INSTANCE_NAME};

/// [`ConfigFactory`] plus a stash of previously built instances.
///
/// `load` prefers the stash and falls back to building from
/// configuration. A freshly built instance is not written back; call
/// [`ConfigManager::dump`] to persist it.
pub struct ConfigManager<T> {
    factory: ConfigFactory<T>,
    stash: Box<dyn Stash<T> + Send>,
    default_name: String,
}

impl<T: 'static> ConfigManager<T> {
    pub fn new<S>(factory: ConfigFactory<T>, stash: S) -> Self
    where
        S: Stash<T> + Send + 'static,
    {
        Self {
            factory,
            stash: Box::new(stash),
            default_name: DEFAULT_INSTANCE_NAME.to_string(),
        }
    }

    /// Name used by [`ConfigManager::load_default`].
    pub fn with_default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = name.into();
        self
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub fn factory(&self) -> &ConfigFactory<T> {
        &self.factory
    }

    pub fn stash_mut(&mut self) -> &mut (dyn Stash<T> + Send) {
        self.stash.as_mut()
    }

    /// The stashed instance `name`, or a new one built from configuration.
    pub fn load(&mut self, name: &str) -> FactoryResult<T> {
        if let Some(inst) = self.stash.load(name)? {
            debug!(name, "loaded from stash");
            return Ok(inst);
        }
        debug!(name, "not stashed, creating");
        self.factory.instance(name, Params::new())
    }

    pub fn load_default(&mut self) -> FactoryResult<T> {
        let name = self.default_name.clone();
        self.load(&name)
    }

    pub fn dump(&mut self, name: &str, inst: &T) -> FactoryResult<()> {
        self.stash.dump(name, inst)?;
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> FactoryResult<()> {
        self.stash.delete(name)?;
        Ok(())
    }

    pub fn keys(&mut self) -> FactoryResult<Vec<String>> {
        Ok(self.stash.keys()?)
    }
}

impl<T> Deref for ConfigManager<T> {
    type Target = ConfigFactory<T>;

    fn deref(&self) -> &Self::Target {
        &self.factory
    }
}

impl<T> DerefMut for ConfigManager<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.factory
    }
}

impl<T> fmt::Debug for ConfigManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigManager")
            .field("factory", &self.factory)
            .field("default_name", &self.default_name)
            .finish_non_exhaustive()
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FactoryError;
    use crate::factory::{InstanceArgs, Instantiate};
    use confstash_config::Config;
    use confstash_persist::{DictionaryStash, DirectoryStash};
    use serde::{Deserialize, Serialize};

    const CONF: &str = "\
[confi_pass_widget_from_mng]
class_name = Widget
param1 = ip3

[defname_widget_from_mng]
class_name = Widget
param1 = dflt
";

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        param1: String,
        #[serde(default)]
        name: String,
    }

    impl Instantiate for Widget {
        const WANTS_NAME: bool = true;

        fn instantiate(args: InstanceArgs) -> FactoryResult<Self> {
            let param1 = args.require_str("param1")?.to_string();
            Ok(Self {
                param1,
                name: args.name().unwrap_or_default().to_string(),
            })
        }
    }

    fn factory() -> ConfigFactory<Widget> {
        let config = Config::from_ini_str(CONF).unwrap();
        let mut factory = ConfigFactory::new(config).with_pattern("{name}_widget_from_mng");
        factory.register::<Widget>();
        factory
    }

    #[test]
    fn load_builds_without_persisting() {
        let mut mng = ConfigManager::new(factory(), DictionaryStash::new());
        let w = mng.load("confi_pass").unwrap();
        assert_eq!(w.param1, "ip3");
        assert_eq!(w.name, "confi_pass");
        assert!(mng.keys().unwrap().is_empty());
    }

    #[test]
    fn load_prefers_stash() {
        let mut mng = ConfigManager::new(factory(), DictionaryStash::new());
        let stashed = Widget {
            param1: "from stash".into(),
            name: "confi_pass".into(),
        };
        mng.dump("confi_pass", &stashed).unwrap();
        assert_eq!(mng.load("confi_pass").unwrap(), stashed);

        mng.delete("confi_pass").unwrap();
        assert_eq!(mng.load("confi_pass").unwrap().param1, "ip3");
    }

    #[test]
    fn default_name_and_deref() {
        let mut mng =
            ConfigManager::new(factory(), DictionaryStash::new()).with_default_name("defname");
        assert_eq!(mng.load_default().unwrap().param1, "dflt");
        assert_eq!(mng.pattern(), "{name}_widget_from_mng");
        assert_eq!(mng.instance("confi_pass", Params::new()).unwrap().param1, "ip3");
    }

    #[test]
    fn directory_backed_manager_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut mng = ConfigManager::new(factory(), DirectoryStash::new(dir.path()));
            let w = mng.load("confi_pass").unwrap();
            mng.dump("confi_pass", &w).unwrap();
        }
        let mut mng = ConfigManager::new(factory(), DirectoryStash::new(dir.path()));
        assert_eq!(mng.keys().unwrap(), vec!["confi_pass"]);
        assert_eq!(mng.load("confi_pass").unwrap().param1, "ip3");
    }

    #[test]
    fn unknown_name_fails() {
        let mut mng = ConfigManager::new(factory(), DictionaryStash::new());
        assert!(matches!(mng.load("nope"), Err(FactoryError::Config(_))));
    }
}
