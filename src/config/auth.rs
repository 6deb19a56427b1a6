use std::fmt::Debug;

use derive_getters::Getters;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::ConfigError;

#[derive(Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CredentialConfig {
    Plain { user: String, password: String },
    Command { user: String, password_cmd: String },
}

impl CredentialConfig {
    pub fn identity(&self) -> &str {
        match self {
            CredentialConfig::Plain { user, .. } | CredentialConfig::Command { user, .. } => user,
        }
    }

    /// Produces the secret, running `password_cmd` if one is configured.
    pub async fn resolve(&self) -> Result<Credential, ConfigError> {
        match self {
            CredentialConfig::Plain { user, password } => Ok(Credential {
                identity: user.clone(),
                secret: password.clone(),
            }),
            CredentialConfig::Command { user, password_cmd } => Ok(Credential {
                identity: user.clone(),
                secret: run_password_cmd(user, password_cmd).await?,
            }),
        }
    }
}

impl Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialConfig::Plain { user, .. } => {
                f.debug_struct("Plain").field("user", user).finish_non_exhaustive()
            }
            CredentialConfig::Command { user, password_cmd } => f
                .debug_struct("Command")
                .field("user", user)
                .field("password_cmd", password_cmd)
                .finish(),
        }
    }
}

async fn run_password_cmd(identity: &str, password_cmd: &str) -> Result<String, ConfigError> {
    let failure = |reason: String| ConfigError::PasswordCommand {
        identity: identity.to_string(),
        reason,
    };
    let mut cmd_parts = password_cmd.split_whitespace();
    let mut cmd = Command::new(
        cmd_parts
            .next()
            .ok_or_else(|| failure("no program given".to_string()))?,
    );
    for part in cmd_parts {
        cmd.arg(part);
    }
    let output = cmd.output().await.map_err(|e| failure(e.to_string()))?;
    if !output.status.success() {
        return Err(failure(format!("exited with {}", output.status)));
    }
    let password = String::from_utf8(output.stdout)
        .map_err(|_| failure("output is not valid UTF-8".to_string()))?
        .trim_end()
        .to_string();
    if password.is_empty() {
        return Err(failure("printed no password".to_string()));
    }
    Ok(password)
}

/// Login data for one session. The secret never shows up in `Debug` output.
#[derive(Clone, Getters)]
pub struct Credential {
    identity: String,
    secret: String,
}

impl Credential {
    #[cfg(test)]
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
