//! # confstash-factory
//!
//! Build objects from configuration sections, and keep them around.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  CachingConfigFactory (moka, Arc per name)   │
//! ├──────────────────────────────────────────────┤
//! │  ConfigManager  (stash first, else build)    │
//! ├──────────────────────────────────────────────┤
//! │  ConfigFactory  (section → class_name →      │
//! │                  registered constructor)     │
//! │  StashFactory   (stash graphs from config)   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use confstash_config::{Config, Params};
//! use confstash_factory::ConfigFactory;
//!
//! let config = Config::open("etc/widgets.conf")?;
//! let mut factory = ConfigFactory::<Widget>::new(config).with_pattern("{name}_widget");
//! factory.register::<Widget>();
//! let cool = factory.instance("cool", Params::new())?;
//! ```

pub mod caching;
pub mod error;
pub mod factory;
pub mod manager;
pub mod stash_factory;

// ── re-exports ───────────────────────────────────────────────────────

pub use caching::{CacheStats, CachingConfigFactory};
pub use error::{FactoryError, FactoryResult};
pub use factory::{
    CLASS_NAME_OPTION, ConfigFactory, Constructor, DEFAULT_INSTANCE_NAME, DEFAULT_PATTERN,
    InstanceArgs, Instantiate,
};
pub use manager::ConfigManager;
pub use stash_factory::{BoxedStash, StashFactory};
