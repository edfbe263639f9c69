//! Build objects from configuration sections.
//!
//! A [`ConfigFactory`] maps an instance name to a section (through a
//! pattern such as `{name}_widget`), reads the section's `class_name`
//! option, looks that name up in its registry and hands the remaining
//! coerced options to the registered constructor.
//!
//! Given
//!
//! ```ini
//! [cool_widget]
//! class_name = Widget
//! param1 = 3.14
//! ```
//!
//! a factory with pattern `{name}_widget` and `Widget` registered builds a
//! `Widget { param1: 3.14, .. }` from `factory.instance("cool", ..)`.
//!
//! Types opt into receiving the configuration or their instance name via
//! [`Instantiate::WANTS_CONFIG`] and [`Instantiate::WANTS_NAME`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use confstash_config::{Config, Params};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{FactoryError, FactoryResult};

/// Section pattern used when none is given.
pub const DEFAULT_PATTERN: &str = "{name}";

/// Option naming the type to construct.
pub const CLASS_NAME_OPTION: &str = "class_name";

/// Instance name used by [`ConfigFactory::instance_default`].
pub const DEFAULT_INSTANCE_NAME: &str = "default";

const NAME_PLACEHOLDER: &str = "{name}";

// ── instance arguments ───────────────────────────────────────────────

/// Everything a constructor receives.
#[derive(Debug, Clone)]
pub struct InstanceArgs {
    params: Params,
    config: Option<Arc<Config>>,
    name: Option<String>,
    chain: Vec<String>,
}

impl InstanceArgs {
    /// Arguments with only `params`.
    pub fn new(params: Params) -> Self {
        Self {
            params,
            config: None,
            name: None,
            chain: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: Arc<Config>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn into_params(self) -> Params {
        self.params
    }

    /// The factory's configuration, if the type asked for it.
    pub fn config(&self) -> Option<&Arc<Config>> {
        self.config.as_ref()
    }

    /// The instance name, if the type asked for it.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Instance names being built, outermost first, ending with this one.
    /// Empty for arguments not created by a factory.
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// Look up a single parameter.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// A string parameter, failing if absent or not a string.
    pub fn require_str(&self, key: &str) -> FactoryResult<&str> {
        self.params
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| FactoryError::InvalidParams {
                name: self.display_name().to_string(),
                reason: format!("missing string parameter `{key}`"),
            })
    }

    /// Deserialize the parameters into a typed struct.
    pub fn deserialize<P: DeserializeOwned>(&self) -> FactoryResult<P> {
        serde_json::from_value(Value::Object(self.params.clone())).map_err(|e| {
            FactoryError::InvalidParams {
                name: self.display_name().to_string(),
                reason: e.to_string(),
            }
        })
    }

    fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

// ── capability trait ─────────────────────────────────────────────────

/// A type a [`ConfigFactory`] can construct from section parameters.
///
/// ```rust
/// # use confstash_factory::{FactoryResult, InstanceArgs, Instantiate};
/// #[derive(serde::Deserialize)]
/// struct Widget {
///     param1: f64,
///     #[serde(default)]
///     param2: Option<i64>,
/// }
///
/// impl Instantiate for Widget {
///     fn instantiate(args: InstanceArgs) -> FactoryResult<Self> {
///         args.deserialize()
///     }
/// }
/// ```
pub trait Instantiate: Sized {
    /// Inject the factory's configuration into [`InstanceArgs::config`].
    const WANTS_CONFIG: bool = false;

    /// Inject the instance name into [`InstanceArgs::name`].
    const WANTS_NAME: bool = false;

    fn instantiate(args: InstanceArgs) -> FactoryResult<Self>;
}

/// Closure constructor; receives the factory so it can build nested
/// instances.
pub type Constructor<T> =
    Arc<dyn Fn(&ConfigFactory<T>, InstanceArgs) -> FactoryResult<T> + Send + Sync>;

struct Registration<T> {
    wants_config: bool,
    wants_name: bool,
    ctor: Constructor<T>,
}

// ═══════════════════════════════════════════════════════════════════════
//  ConfigFactory
// ═══════════════════════════════════════════════════════════════════════

/// Creates `T` instances from named configuration sections.
pub struct ConfigFactory<T> {
    config: Arc<Config>,
    pattern: String,
    registry: HashMap<String, Registration<T>>,
}

impl<T: 'static> ConfigFactory<T> {
    /// A factory reading sections named exactly like the instance.
    pub fn new(config: impl Into<Arc<Config>>) -> Self {
        Self {
            config: config.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            registry: HashMap::new(),
        }
    }

    /// Map instance names to sections via `pattern`, e.g. `{name}_widget`.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Section holding the options of instance `name`.
    pub fn section_name(&self, name: &str) -> String {
        self.pattern.replace(NAME_PLACEHOLDER, name)
    }

    /// Register `W` under its unqualified type name.
    pub fn register<W>(&mut self) -> &mut Self
    where
        W: Instantiate + Into<T> + 'static,
    {
        self.register_as::<W>(short_type_name::<W>())
    }

    /// Register `W` under `class_name`.
    pub fn register_as<W>(&mut self, class_name: impl Into<String>) -> &mut Self
    where
        W: Instantiate + Into<T> + 'static,
    {
        self.register_into::<W, _>(class_name, Into::into)
    }

    /// Register `W` under `class_name`, converting each built `W` with
    /// `convert`.
    pub fn register_into<W, F>(&mut self, class_name: impl Into<String>, convert: F) -> &mut Self
    where
        W: Instantiate + 'static,
        F: Fn(W) -> T + Send + Sync + 'static,
    {
        self.insert(
            class_name.into(),
            Registration {
                wants_config: W::WANTS_CONFIG,
                wants_name: W::WANTS_NAME,
                ctor: Arc::new(move |_: &ConfigFactory<T>, args: InstanceArgs| {
                    W::instantiate(args).map(&convert)
                }),
            },
        )
    }

    /// Register a closure constructor. It always receives the configuration
    /// and the instance name.
    pub fn register_fn<F>(&mut self, class_name: impl Into<String>, ctor: F) -> &mut Self
    where
        F: Fn(&ConfigFactory<T>, InstanceArgs) -> FactoryResult<T> + Send + Sync + 'static,
    {
        self.insert(
            class_name.into(),
            Registration {
                wants_config: true,
                wants_name: true,
                ctor: Arc::new(ctor),
            },
        )
    }

    fn insert(&mut self, class_name: String, registration: Registration<T>) -> &mut Self {
        debug!(class_name = %class_name, "class registered");
        self.registry.insert(class_name, registration);
        self
    }

    /// Whether `class_name` is registered.
    pub fn is_registered(&self, class_name: &str) -> bool {
        self.registry.contains_key(class_name)
    }

    /// Registered class names, sorted.
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.registry.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build instance `name`; `overrides` replace section parameters.
    pub fn instance(&self, name: &str, overrides: Params) -> FactoryResult<T> {
        self.build(name, overrides, Vec::new())
    }

    /// Build instance `name` as a part of the instance `parent` describes.
    ///
    /// Fails with [`FactoryError::Construction`] if `name` is already being
    /// built further up the chain.
    pub fn nested_instance(
        &self,
        name: &str,
        parent: &InstanceArgs,
        overrides: Params,
    ) -> FactoryResult<T> {
        if parent.chain.iter().any(|n| n == name) {
            let mut cycle = parent.chain.clone();
            cycle.push(name.to_string());
            return Err(FactoryError::Construction {
                name: name.to_string(),
                reason: format!("instance cycle: {}", cycle.join(" -> ")),
            });
        }
        self.build(name, overrides, parent.chain.clone())
    }

    fn build(&self, name: &str, overrides: Params, mut chain: Vec<String>) -> FactoryResult<T> {
        let section = self.section_name(name);
        debug!(name, section = %section, "creating instance");

        let mut params = self.config.populate(Some(&section))?;
        let class_name = match params.remove(CLASS_NAME_OPTION) {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => return Err(FactoryError::MissingClassName { section }),
        };
        let registration =
            self.registry
                .get(&class_name)
                .ok_or_else(|| FactoryError::ClassNotFound {
                    class_name: class_name.clone(),
                    section: section.clone(),
                })?;

        params.extend(overrides);
        for (key, value) in &params {
            debug!(key = %key, value = %value, "populating");
        }

        chain.push(name.to_string());
        let mut args = InstanceArgs::new(params);
        args.chain = chain;
        if registration.wants_config {
            args = args.with_config(Arc::clone(&self.config));
        }
        if registration.wants_name {
            args = args.with_name(name);
        }
        (registration.ctor)(self, args)
    }

    /// Build the instance named [`DEFAULT_INSTANCE_NAME`].
    pub fn instance_default(&self) -> FactoryResult<T> {
        self.instance(DEFAULT_INSTANCE_NAME, Params::new())
    }
}

impl<T> fmt::Debug for ConfigFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<&String> = self.registry.keys().collect();
        classes.sort();
        f.debug_struct("ConfigFactory")
            .field("config", &self.config.to_string())
            .field("pattern", &self.pattern)
            .field("classes", &classes)
            .finish()
    }
}

/// `Widget` for `my_crate::widgets::Widget<u32>`.
fn short_type_name<W>() -> &'static str {
    let full = std::any::type_name::<W>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ── tests ────────────────────────────────────────────────────────────
