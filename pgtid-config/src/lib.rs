//! Configuration types and loading for the pseudo-GTID matcher.
//!
//! Configuration is layered: a base file, an environment specific file and `APP_`-prefixed
//! environment variables. See [`load_config`] for the exact precedence.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{
    CONFIGURATION_DIR_ENV_NAME, Config, LoadConfigError, load_config, load_config_from_dir,
};
