//! Error types for the confstash-factory crate.

use confstash_config::ConfigError;
use confstash_persist::PersistError;
use thiserror::Error;

/// Alias for `Result<T, FactoryError>`.
pub type FactoryResult<T> = Result<T, FactoryError>;

/// Errors raised while resolving and constructing configured instances.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// Reading the configuration failed.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The backing stash failed.
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),

    /// No type is registered under the section's class name.
    #[error("class `{class_name}` not registered (section `{section}`)")]
    ClassNotFound { class_name: String, section: String },

    /// The section has no `class_name` option.
    #[error("section `{section}` has no class_name")]
    MissingClassName { section: String },

    /// Section parameters do not fit the target type.
    #[error("invalid parameters for `{name}`: {reason}")]
    InvalidParams { name: String, reason: String },

    /// The constructor itself failed.
    #[error("failed to construct `{name}`: {reason}")]
    Construction { name: String, reason: String },
}
