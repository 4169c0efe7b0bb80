use std::io;
use std::path::{Path, PathBuf};

use rust_cli_config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Variable naming the configuration directory, overriding `./configuration`.
pub const CONFIGURATION_DIR_ENV_NAME: &str = "PGTID_CONFIGURATION_DIR";

const DEFAULT_CONFIGURATION_DIR: &str = "configuration";

const FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

const ENV_PREFIX: &str = "APP";
const ENV_PREFIX_SEPARATOR: &str = "_";
const ENV_KEY_SEPARATOR: &str = "__";
const ENV_LIST_SEPARATOR: &str = ",";

/// A configuration structure loadable with [`load_config`].
pub trait Config {
    /// Dotted keys whose environment variable values are comma-separated lists, e.g.
    /// `marker.skip_event_kinds`.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Errors raised while locating, parsing or merging configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    /// Neither `{layer}.yaml`, `{layer}.yml` nor `{layer}.json` exists.
    #[error("no {layer} configuration file in `{directory}`; attempted: {attempted}")]
    ConfigurationFileMissing {
        layer: String,
        directory: PathBuf,
        attempted: String,
    },

    #[error("failed to load {layer} configuration from `{path}`: {source}")]
    ConfigurationFileLoad {
        layer: String,
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("failed to merge configuration: {0}")]
    Builder(#[source] rust_cli_config::ConfigError),
}

/// Loads the configuration for the environment named by `APP_ENVIRONMENT`.
///
/// Files are read from the directory named by `PGTID_CONFIGURATION_DIR`, or `./configuration`
/// when unset. Precedence, lowest first:
///
/// 1. `base.(yaml|yml|json)`
/// 2. `{environment}.(yaml|yml|json)`
/// 3. `APP_`-prefixed variables, with `__` between nested keys (`APP_MARKER__PAGE_SIZE`) and
///    comma-separated values for [`Config::LIST_PARSE_KEYS`].
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let directory = match std::env::var_os(CONFIGURATION_DIR_ENV_NAME) {
        Some(directory) => PathBuf::from(directory),
        None => std::env::current_dir()
            .map_err(LoadConfigError::CurrentDir)?
            .join(DEFAULT_CONFIGURATION_DIR),
    };
    let environment = Environment::load()?;

    load_config_from_dir(&directory, environment)
}

/// Loads the configuration layers of `environment` from `directory`.
pub fn load_config_from_dir<T>(
    directory: &Path,
    environment: Environment,
) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let mut builder = rust_cli_config::Config::builder();
    for layer in ["base", environment.as_str()] {
        let path = find_layer_file(directory, layer)?;
        builder = builder.add_source(rust_cli_config::File::from(path.clone()));
        check_layer(&builder, layer, &path)?;
    }

    builder
        .add_source(environment_overrides::<T>())
        .build()
        .map_err(LoadConfigError::Builder)?
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn environment_overrides<T: Config>() -> rust_cli_config::Environment {
    let source = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_KEY_SEPARATOR);

    if T::LIST_PARSE_KEYS.is_empty() {
        return source;
    }

    T::LIST_PARSE_KEYS.iter().fold(
        source.try_parsing(true).list_separator(ENV_LIST_SEPARATOR),
        |source, key| source.with_list_parse_key(key),
    )
}

fn find_layer_file(directory: &Path, layer: &str) -> Result<PathBuf, LoadConfigError> {
    let candidates: Vec<PathBuf> = FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{layer}.{extension}")))
        .collect();

    if let Some(path) = candidates.iter().find(|path| path.is_file()) {
        return Ok(path.clone());
    }

    Err(LoadConfigError::ConfigurationFileMissing {
        layer: layer.to_string(),
        directory: directory.to_path_buf(),
        attempted: candidates
            .iter()
            .map(|path| format!("`{}`", path.display()))
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Parses the layers added so far, attributing a failure to the newest one.
fn check_layer(
    builder: &ConfigBuilder<DefaultState>,
    layer: &str,
    path: &Path,
) -> Result<(), LoadConfigError> {
    match builder.clone().build() {
        Ok(_) => Ok(()),
        Err(source) => Err(LoadConfigError::ConfigurationFileLoad {
            layer: layer.to_string(),
            path: path.to_path_buf(),
            source,
        }),
    }
}
