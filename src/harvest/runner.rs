use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use derive_getters::Getters;
use log::{error, info};

use crate::{
    config::{Config, CredentialConfig},
    harvest::{
        lister::ExtensionFilter,
        pipeline::{BatchResult, Pipeline},
    },
    session::Session,
};

/// Files of one remote folder that could not be harvested.
#[derive(Debug, PartialEq, Eq, Getters)]
pub struct FailedBatch {
    identity: String,
    folder: String,
    names: Vec<String>,
}

/// Totals of a whole run.
#[derive(Debug, Default, PartialEq, Eq, Getters)]
pub struct RunSummary {
    extension: String,
    per_local: Vec<(PathBuf, usize)>,
    #[getter(skip)]
    total: usize,
    failed: Vec<FailedBatch>,
    unavailable: Vec<String>,
}

impl RunSummary {
    fn new(extension: &str, locals: impl Iterator<Item = PathBuf>) -> Self {
        let mut per_local: Vec<(PathBuf, usize)> = Vec::new();
        for local in locals {
            if !per_local.iter().any(|(known, _)| *known == local) {
                per_local.push((local, 0));
            }
        }
        Self {
            extension: extension.to_string(),
            per_local,
            ..Self::default()
        }
    }

    fn merge(&mut self, identity: &str, folder: &str, local: &Path, batch: BatchResult) {
        let transferred = batch.transferred_count();
        if let Some((_, count)) = self.per_local.iter_mut().find(|(known, _)| known == local) {
            *count += transferred;
        } else {
            self.per_local.push((local.to_path_buf(), transferred));
        }
        self.total += transferred;
        if !batch.failed_names().is_empty() {
            self.failed.push(FailedBatch {
                identity: identity.to_string(),
                folder: folder.to_string(),
                names: batch.failed_names().clone(),
            });
        }
    }

    #[cfg(test)]
    pub fn total(&self) -> usize {
        self.total
    }

    #[cfg(test)]
    pub fn count_for(&self, local: &Path) -> Option<usize> {
        self.per_local
            .iter()
            .find(|(known, _)| known == local)
            .map(|(_, count)| *count)
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let extension = &self.extension;
        for (local, count) in &self.per_local {
            writeln!(f, "transferred {count} {extension} file(s) to {}", local.display())?;
        }
        writeln!(f, "total: {} {extension} file(s) transferred", self.total)?;
        for batch in &self.failed {
            writeln!(
                f,
                "failed in {} as {}: {}",
                batch.folder,
                batch.identity,
                batch.names.join(", ")
            )?;
        }
        for identity in &self.unavailable {
            writeln!(f, "no session for {identity}")?;
        }
        Ok(())
    }
}

/// Harvests every configured folder with every configured credential, one
/// session at a time.
pub struct Runner<'a> {
    config: &'a Config,
    pipeline: Pipeline,
}

impl<'a> Runner<'a> {
    pub fn new(config: &'a Config, delete_remote: bool) -> Self {
        Self {
            config,
            pipeline: Pipeline::new(ExtensionFilter::new(config.extension()), delete_remote),
        }
    }

    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::new(
            self.config.extension(),
            self.config
                .folders()
                .iter()
                .map(|mapping| mapping.local().to_path_buf()),
        );
        for credential in self.config.credentials() {
            self.run_credential(credential, &mut summary).await;
        }
        summary
    }

    async fn run_credential(&self, credential: &CredentialConfig, summary: &mut RunSummary) {
        let identity = credential.identity();
        let credential = match credential.resolve().await {
            Ok(credential) => credential,
            Err(e) => {
                error!("{e}");
                summary.unavailable.push(identity.to_string());
                return;
            }
        };
        let Ok(mut session) = Session::connect(self.config.connection(), &credential).await else {
            summary.unavailable.push(identity.to_string());
            return;
        };

        for mapping in self.config.folders() {
            if !session.is_connected() {
                error!(
                    identity = identity;
                    "connection lost, skipping {} and later folders",
                    mapping.remote()
                );
                summary.unavailable.push(identity.to_string());
                break;
            }
            info!("harvesting {} into {}", mapping.remote(), mapping.local().display());
            let batch = self.pipeline.run(&mut session, mapping).await;
            info!(
                "{} {} file(s) from {} into {}",
                batch.transferred_count(),
                self.config.extension(),
                mapping.remote(),
                mapping.local().display()
            );
            summary.merge(identity, mapping.remote(), mapping.local(), batch);
        }
        session.disconnect().await;
    }
}
