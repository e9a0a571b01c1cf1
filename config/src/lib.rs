//! Configuration types shared by the view engine and the processes embedding it.
//!
//! Connection settings and start options are plain serde types so they can be loaded from
//! YAML/JSON files and `APP_`-prefixed environment variables through [`load_config`].

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
