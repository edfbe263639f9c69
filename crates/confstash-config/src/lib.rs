//! # confstash-config
//!
//! INI configuration reader for confstash.
//!
//! - **[`parser`]** -- INI text to sections of raw options, with a
//!   `[DEFAULT]` fallback section and indented continuation lines.
//! - **[`interpolation`]** -- `%(name)s` and `${section:name}` references,
//!   resolved recursively on read.
//! - **[`config`]** -- the [`Config`] reader: whole sections, single options,
//!   typed accessors, and robust (missing is empty) mode.
//! - **[`populate`]** -- coercion of string values into typed [`Params`]
//!   used to construct objects from sections.
//!
//! ## Quick start
//!
//! ```ignore
//! use confstash_config::Config;
//!
//! let config = Config::open("etc/app.conf")?;
//! let params = config.populate(Some("cool_widget"))?;
//! assert_eq!(params["param1"], serde_json::json!(3.14));
//! ```

pub mod config;
pub mod error;
pub mod interpolation;
pub mod parser;
pub mod populate;

// ── re-exports ───────────────────────────────────────────────────────

pub use config::{Config, ConfigBuilder, Options};
pub use error::{ConfigError, ConfigResult};
pub use interpolation::{Interpolation, Vars};
pub use parser::Ini;
pub use populate::Params;
