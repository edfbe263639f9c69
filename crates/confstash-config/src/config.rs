//! The application configuration reader.
//!
//! [`Config`] reads an INI file once and answers queries for whole sections
//! or single options, interpolating values on the way out.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::interpolation::{Interpolation, Resolver, Vars};
use crate::parser::Ini;
use crate::populate::{self, Params};

/// Interpolated options of a section, keyed by option name.
pub type Options = BTreeMap<String, String>;

/// Section consulted when no section is given.
pub const DEFAULT_SECTION_NAME: &str = "default";

/// INI backed application configuration.
///
/// # Example
///
/// ```rust,no_run
/// # use confstash_config::{Config, Interpolation};
/// # fn example() -> confstash_config::ConfigResult<()> {
/// let config = Config::builder("etc/app.conf")
///     .robust(true)
///     .interpolation(Interpolation::Extended)
///     .load()?;
///
/// let workers = config.get_option_int("workers", Some("pool"))?.unwrap_or(4);
/// # let _ = workers;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    config_file: Option<PathBuf>,
    default_section: String,
    robust: bool,
    default_vars: Option<Vars>,
    interpolation: Interpolation,
    ini: Ini,
}

impl Config {
    /// Start building a reader for the file at `path`.
    pub fn builder(path: impl Into<PathBuf>) -> ConfigBuilder {
        ConfigBuilder {
            path: Some(path.into()),
            ..ConfigBuilder::default()
        }
    }

    /// Read `path` with all defaults (non-robust, basic interpolation).
    pub fn open(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        Self::builder(path).load()
    }

    /// Build a reader over in-memory INI text.
    pub fn from_ini_str(text: &str) -> ConfigResult<Self> {
        ConfigBuilder::default().load_str(text)
    }

    /// Path of the backing file, if any.
    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// The section used when callers do not name one.
    pub fn default_section(&self) -> &str {
        &self.default_section
    }

    /// Whether missing files and sections yield empty results.
    pub fn is_robust(&self) -> bool {
        self.robust
    }

    /// All options of `section`, including `[DEFAULT]` fallbacks.
    pub fn get_options(&self, section: &str) -> ConfigResult<Options> {
        self.get_options_with(section, None, None)
    }

    /// Options of `section`, optionally restricted to `opt_keys` and resolved
    /// with extra interpolation `vars`.
    pub fn get_options_with(
        &self,
        section: &str,
        opt_keys: Option<&[&str]>,
        vars: Option<&Vars>,
    ) -> ConfigResult<Options> {
        if !self.ini.has_section(section) {
            if self.robust {
                debug!(section, "no section--skipping");
                return Ok(Options::new());
            }
            return Err(ConfigError::NoSection {
                section: section.to_string(),
            });
        }

        let vars = vars.or(self.default_vars.as_ref());
        let resolver = Resolver::new(&self.ini, vars, self.interpolation);
        let mut keys = self.ini.option_keys(section);
        if let Some(wanted) = opt_keys {
            keys.retain(|k| wanted.iter().any(|w| w.eq_ignore_ascii_case(k)));
        }

        let mut opts = Options::new();
        for key in keys {
            if let Some(value) = resolver.get(section, &key)? {
                opts.insert(key, value);
            }
        }
        Ok(opts)
    }

    /// Return option `name` from `section` (default section if `None`).
    pub fn get_option(&self, name: &str, section: Option<&str>) -> ConfigResult<Option<String>> {
        self.get_option_with(name, section, None)
    }

    /// Like [`Config::get_option`], resolved with extra interpolation `vars`.
    pub fn get_option_with(
        &self,
        name: &str,
        section: Option<&str>,
        vars: Option<&Vars>,
    ) -> ConfigResult<Option<String>> {
        let section = section.unwrap_or(&self.default_section);
        let mut opts = self.get_options_with(section, Some(&[name]), vars)?;
        Ok(opts.remove(&name.to_lowercase()))
    }

    /// Like [`Config::get_option`] but a missing option is an error.
    pub fn get_option_expect(&self, name: &str, section: Option<&str>) -> ConfigResult<String> {
        self.get_option(name, section)?
            .ok_or_else(|| ConfigError::MissingOption {
                option: name.to_string(),
                section: section.unwrap_or(&self.default_section).to_string(),
            })
    }

    /// Option parsed as an integer.
    pub fn get_option_int(&self, name: &str, section: Option<&str>) -> ConfigResult<Option<i64>> {
        self.get_parsed(name, section, "integer", |v| v.trim().parse().ok())
    }

    /// Option parsed as a float.
    pub fn get_option_float(&self, name: &str, section: Option<&str>) -> ConfigResult<Option<f64>> {
        self.get_parsed(name, section, "float", |v| v.trim().parse().ok())
    }

    /// Option parsed as a boolean (`1/yes/true/on`, `0/no/false/off`).
    pub fn get_option_boolean(
        &self,
        name: &str,
        section: Option<&str>,
    ) -> ConfigResult<Option<bool>> {
        self.get_parsed(name, section, "boolean", |v| {
            match v.trim().to_lowercase().as_str() {
                "1" | "yes" | "true" | "on" => Some(true),
                "0" | "no" | "false" | "off" => Some(false),
                _ => None,
            }
        })
    }

    /// Option split on commas, trimmed, with empty items dropped.
    pub fn get_option_list(
        &self,
        name: &str,
        section: Option<&str>,
    ) -> ConfigResult<Option<Vec<String>>> {
        Ok(self.get_option(name, section)?.map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }))
    }

    /// Option as a filesystem path.
    pub fn get_option_path(
        &self,
        name: &str,
        section: Option<&str>,
    ) -> ConfigResult<Option<PathBuf>> {
        Ok(self.get_option(name, section)?.map(PathBuf::from))
    }

    /// All options of the default section.
    pub fn options(&self) -> ConfigResult<Options> {
        self.get_options(&self.default_section)
    }

    /// Names of every section (excluding `[DEFAULT]`).
    pub fn sections(&self) -> BTreeSet<String> {
        self.ini.section_names().map(str::to_string).collect()
    }

    /// Whether `section` exists.
    pub fn has_section(&self, section: &str) -> bool {
        self.ini.has_section(section)
    }

    /// Options of `section` (default section if `None`) with type coercion.
    pub fn populate(&self, section: Option<&str>) -> ConfigResult<Params> {
        self.populate_with(section, true)
    }

    /// Options of `section` as a [`Params`] map, coercing types when
    /// `parse_types` is set.
    pub fn populate_with(&self, section: Option<&str>, parse_types: bool) -> ConfigResult<Params> {
        let section = section.unwrap_or(&self.default_section);
        let opts = self.get_options(section)?;
        populate::coerce_options(&opts, parse_types)
    }

    /// Populate a typed target from the coerced options of `section`.
    pub fn populate_into<T: DeserializeOwned>(&self, section: Option<&str>) -> ConfigResult<T> {
        let params = self.populate(section)?;
        Ok(serde_json::from_value(serde_json::Value::Object(params))?)
    }

    fn get_parsed<T>(
        &self,
        name: &str,
        section: Option<&str>,
        expected: &'static str,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> ConfigResult<Option<T>> {
        match self.get_option(name, section)? {
            None => Ok(None),
            Some(value) => parse(&value).map(Some).ok_or(ConfigError::InvalidValue {
                option: name.to_string(),
                expected,
                value,
            }),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = self
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string());
        write!(f, "file: {file}, section: {:?}", self.sections())
    }
}

// ── builder ──────────────────────────────────────────────────────────

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    path: Option<PathBuf>,
    default_section: String,
    robust: bool,
    default_vars: Option<Vars>,
    interpolation: Interpolation,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            path: None,
            default_section: DEFAULT_SECTION_NAME.to_string(),
            robust: false,
            default_vars: None,
            interpolation: Interpolation::default(),
        }
    }
}

impl ConfigBuilder {
    /// Section used when no section is given (defaults to `default`).
    pub fn default_section(mut self, section: impl Into<String>) -> Self {
        self.default_section = section.into();
        self
    }

    /// Treat a missing file or section as empty instead of an error.
    pub fn robust(mut self, robust: bool) -> Self {
        self.robust = robust;
        self
    }

    /// Variables consulted first during interpolation.
    pub fn default_vars(mut self, vars: Vars) -> Self {
        self.default_vars = Some(vars);
        self
    }

    /// Interpolation syntax (defaults to [`Interpolation::Basic`]).
    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Read and parse the configured file.
    pub fn load(self) -> ConfigResult<Config> {
        let Some(path) = self.path.clone() else {
            return self.load_str("");
        };
        debug!(path = %path.display(), "loading config");

        if !path.is_file() {
            if self.robust {
                debug!(path = %path.display(), "no config file--skipping");
                return self.finish(Ini::default());
            }
            return Err(ConfigError::NoSuchFile { path });
        }

        let text = std::fs::read_to_string(&path)?;
        self.finish(Ini::parse(&text)?)
    }

    /// Parse in-memory INI text instead of a file.
    pub fn load_str(self, text: &str) -> ConfigResult<Config> {
        let ini = Ini::parse(text)?;
        self.finish(ini)
    }

    fn finish(self, ini: Ini) -> ConfigResult<Config> {
        Ok(Config {
            config_file: self.path,
            default_section: self.default_section,
            robust: self.robust,
            default_vars: self.default_vars,
            interpolation: self.interpolation,
            ini,
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────
