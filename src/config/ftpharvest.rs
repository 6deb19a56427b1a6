use std::{fs::read_to_string, path::PathBuf, time::Duration};

use derive_getters::Getters;
use log::error;
use serde::Deserialize;

use crate::{
    config::{CredentialConfig, FolderMapping, default_location},
    error::ConfigError,
    ftp::{ConnectionOptions, ConnectionOptionsBuilder, PassiveMode},
};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    host: String,
    #[serde(default = "port")]
    port: u16,
    #[serde(default)]
    tls: bool,
    #[serde(default)]
    passive_mode: PassiveMode,
    #[serde(default)]
    trust_pasv_address: bool,
    #[serde(default = "extension")]
    extension: String,
    #[serde(default = "timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "delete_remote")]
    delete_remote: bool,
    #[serde(default)]
    credentials: Vec<CredentialConfig>,
    #[serde(default)]
    folders: Vec<toml::Value>,
}

fn port() -> u16 {
    21
}

fn extension() -> String {
    ".pdf".to_string()
}

fn timeout_secs() -> u64 {
    30
}

fn delete_remote() -> bool {
    true
}

#[derive(Debug, Getters)]
pub struct Config {
    connection: ConnectionOptions,
    extension: String,
    #[getter(skip)]
    delete_remote: bool,
    credentials: Vec<CredentialConfig>,
    folders: Vec<FolderMapping>,
}

impl Config {
    pub fn load_from_file(file: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config_file = match file {
            Some(file) => file,
            None => default_location()?,
        };
        let config_contents = read_to_string(&config_file).map_err(|source| ConfigError::Read {
            path: config_file,
            source,
        })?;
        Self::parse(&config_contents)
    }

    /// Parses and validates a configuration. Malformed folder mappings are
    /// logged and left out; everything else that is wrong is an error.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents)?;

        if file.host.trim().is_empty() {
            return Err(ConfigError::Invalid("`host` is empty".to_string()));
        }
        if file.credentials.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one entry in `credentials` is required".to_string(),
            ));
        }
        let extension = match file.extension.trim() {
            "" | "." => {
                return Err(ConfigError::Invalid("`extension` is empty".to_string()));
            }
            extension if extension.starts_with('.') => extension.to_string(),
            extension => format!(".{extension}"),
        };
        if file.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "`timeout_secs` must be positive".to_string(),
            ));
        }

        let folders: Vec<FolderMapping> = file
            .folders
            .iter()
            .enumerate()
            .filter_map(|(index, value)| match FolderMapping::try_from(value) {
                Ok(mapping) => Some(mapping),
                Err(reason) => {
                    error!("{}, skipping it", ConfigError::MalformedMapping { index, reason });
                    None
                }
            })
            .collect();
        if folders.is_empty() {
            return Err(ConfigError::Invalid(
                "no valid entry in `folders`".to_string(),
            ));
        }

        let connection = ConnectionOptionsBuilder::default()
            .host(file.host.trim())
            .port(file.port)
            .tls(file.tls)
            .passive_mode(file.passive_mode)
            .trust_pasv_address(file.trust_pasv_address)
            .timeout(Duration::from_secs(file.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(Self {
            connection,
            extension,
            delete_remote: file.delete_remote,
            credentials: file.credentials,
            folders,
        })
    }

    pub fn delete_remote(&self) -> bool {
        self.delete_remote
    }
}
