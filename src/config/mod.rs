mod auth;
mod folder;
mod ftpharvest;

use std::env;
use std::path::PathBuf;

pub use auth::Credential;
pub use auth::CredentialConfig;
pub use folder::FolderMapping;
pub use ftpharvest::Config;

use crate::error::ConfigError;

fn default_location() -> Result<PathBuf, ConfigError> {
    let mut config_dir = if let Some(config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(config_home)
    } else {
        let mut config_home = PathBuf::from(
            env::var_os("HOME").ok_or(ConfigError::NoLocation("HOME"))?,
        );
        config_home.push(".config");
        config_home
    };
    config_dir.push(env!("CARGO_PKG_NAME"));
    config_dir.push("config.toml");

    Ok(config_dir)
}
