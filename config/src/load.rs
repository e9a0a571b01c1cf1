use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;
use crate::shared::ValidationError;

/// Directory holding configuration files, relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Stem of the file every environment starts from.
const BASE_FILE_STEM: &str = "base";

const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix of environment variable overrides, `APP_NAME=orders`.
const ENV_PREFIX: &str = "APP";

/// Separator for nested keys in environment variables, `APP_DESTINATION__HOST=db`.
const ENV_SEPARATOR: &str = "__";

/// Top-level configuration loaded through [`load_config`].
pub trait Config: DeserializeOwned {
    /// Checks invariants serde cannot express. Runs once all sources are merged.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("no `{stem}` configuration file in `{directory}`, expected one of: {expected}")]
    ConfigurationFileMissing {
        stem: String,
        directory: PathBuf,
        expected: String,
    },

    #[error("failed to merge configuration sources: {0}")]
    Build(#[source] rust_cli_config::ConfigError),

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),
}

/// Loads configuration from the `configuration` directory of the current working directory.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config,
{
    let current_dir = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    load_config_from(&current_dir.join(CONFIGURATION_DIR))
}

/// Loads configuration from `directory`.
///
/// Sources are merged in order, later ones overriding earlier ones: `base.(yaml|yml|json)`, then
/// the file of the current [`Environment`], then `APP_` environment variables. The result is
/// validated before it is returned.
pub fn load_config_from<T>(directory: &Path) -> Result<T, LoadConfigError>
where
    T: Config,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let environment = Environment::load().map_err(LoadConfigError::Environment)?;
    let base_file = find_configuration_file(directory, BASE_FILE_STEM)?;
    let environment_file = find_configuration_file(directory, environment.as_str())?;

    let config = rust_cli_config::Config::builder()
        .add_source(rust_cli_config::File::from(base_file))
        .add_source(rust_cli_config::File::from(environment_file))
        .add_source(
            rust_cli_config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR),
        )
        .build()
        .map_err(LoadConfigError::Build)?
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)?;

    config.validate()?;

    Ok(config)
}

fn find_configuration_file(directory: &Path, stem: &str) -> Result<PathBuf, LoadConfigError> {
    let candidates: Vec<PathBuf> = CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{stem}.{extension}")))
        .collect();

    if let Some(path) = candidates.iter().find(|path| path.is_file()) {
        return Ok(path.clone());
    }

    let expected = candidates
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(", ");

    Err(LoadConfigError::ConfigurationFileMissing {
        stem: stem.to_string(),
        directory: directory.to_path_buf(),
        expected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::EngineConfig;

    #[test]
    fn missing_directory_is_reported() {
        let result = load_config_from::<EngineConfig>(Path::new("/definitely/not/a/config/dir"));

        assert!(matches!(
            result,
            Err(LoadConfigError::MissingConfigurationDirectory(_))
        ));
    }

    #[test]
    fn missing_file_lists_expected_names() {
        let directory = std::env::temp_dir().join("viewsync-config-missing-file");
        std::fs::create_dir_all(&directory).unwrap();

        let err = find_configuration_file(&directory, BASE_FILE_STEM).unwrap_err();

        let LoadConfigError::ConfigurationFileMissing { expected, .. } = err else {
            panic!("unexpected error {err}");
        };
        assert_eq!(expected, "base.yaml, base.yml, base.json");
    }

    #[test]
    fn first_matching_extension_wins() {
        let directory = std::env::temp_dir().join("viewsync-config-extension-order");
        std::fs::create_dir_all(&directory).unwrap();
        std::fs::write(directory.join("prod.yml"), "name: orders\n").unwrap();
        std::fs::write(directory.join("prod.json"), "{}").unwrap();

        let path = find_configuration_file(&directory, "prod").unwrap();

        assert_eq!(path, directory.join("prod.yml"));
    }
}
