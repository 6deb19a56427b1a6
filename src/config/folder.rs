use std::path::{Path, PathBuf};

use toml::Value;

/// Where files from one remote folder end up locally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderMapping {
    remote: String,
    local: PathBuf,
}

impl FolderMapping {
    pub fn new(remote: impl Into<String>, local: impl Into<PathBuf>) -> Self {
        Self {
            remote: remote.into(),
            local: local.into(),
        }
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn local(&self) -> &Path {
        &self.local
    }
}

impl TryFrom<&Value> for FolderMapping {
    type Error = String;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let table = value.as_table().ok_or("expected a table")?;
        let remote = table
            .get("remote")
            .and_then(Value::as_str)
            .ok_or("`remote` must be a string")?;
        if remote.is_empty() {
            return Err("`remote` is empty".to_string());
        }
        if remote.contains(['\r', '\n']) {
            return Err("`remote` contains a line break".to_string());
        }
        let local = table
            .get("local")
            .and_then(Value::as_str)
            .ok_or("`local` must be a string")?;
        if local.is_empty() {
            return Err("`local` is empty".to_string());
        }
        Ok(Self::new(remote, local))
    }
}
