//! Error types for the confstash-config crate.
//!
//! Every fallible reader operation returns [`ConfigError`] via
//! [`ConfigResult`].

use std::path::PathBuf;

use thiserror::Error;

/// Alias for `Result<T, ConfigError>`.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while reading or querying a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file does not exist and the reader is not robust.
    #[error("no such file: {}", path.display())]
    NoSuchFile { path: PathBuf },

    /// The requested section is not present.
    #[error("no section: '{section}'")]
    NoSection { section: String },

    /// An option was required but not found.
    #[error("no option '{option}' found in section {section}")]
    MissingOption { option: String, section: String },

    /// The INI text could not be parsed.
    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// A `%(name)s` or `${section:name}` reference could not be resolved.
    #[error("bad interpolation of option '{option}' in section '{section}': {reason}")]
    Interpolation {
        section: String,
        option: String,
        reason: String,
    },

    /// Interpolation recursed deeper than the allowed maximum.
    #[error("interpolation of option '{option}' in section '{section}' exceeded depth {depth}")]
    InterpolationDepth {
        section: String,
        option: String,
        depth: usize,
    },

    /// An option value could not be converted to the requested type.
    #[error("option '{option}' expected {expected}, got '{value}'")]
    InvalidValue {
        option: String,
        expected: &'static str,
        value: String,
    },

    /// An `eval:` value is not a literal expression.
    #[error("cannot evaluate `{expression}`: {reason}")]
    Eval { expression: String, reason: String },

    /// Deserializing populated options onto a typed target failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
