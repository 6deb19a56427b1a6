use derive_getters::Getters;
use log::{error, info, warn};
use tokio::fs;

use crate::{
    config::FolderMapping,
    harvest::{
        lister::{self, ExtensionFilter},
        remover,
        transfer::{self, TransferOutcome},
    },
    remote::Remote,
};

/// What one pipeline run achieved for a single folder mapping.
#[derive(Debug, Default, PartialEq, Eq, Getters)]
pub struct BatchResult {
    transferred_names: Vec<String>,
    failed_names: Vec<String>,
}

impl BatchResult {
    pub fn transferred_count(&self) -> usize {
        self.transferred_names.len()
    }
}

/// Lists, downloads and then deletes the downloaded files of one remote
/// folder. Never fails; problems are logged and show up in the result.
pub struct Pipeline {
    filter: ExtensionFilter,
    delete_remote: bool,
}

impl Pipeline {
    pub fn new(filter: ExtensionFilter, delete_remote: bool) -> Self {
        Self {
            filter,
            delete_remote,
        }
    }

    pub async fn run<R: Remote>(&self, remote: &mut R, mapping: &FolderMapping) -> BatchResult {
        let mut result = BatchResult::default();
        let folder = mapping.remote();
        let base = mapping.local();

        match fs::metadata(base).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                error!("{} is not a directory, skipping {folder}", base.display());
                return result;
            }
            Err(e) => {
                error!("local folder {} unavailable, skipping {folder}: {e}", base.display());
                return result;
            }
        }

        let candidates = match lister::list(remote, folder, &self.filter).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("{e}");
                return result;
            }
        };

        let mut downloaded = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match transfer::download(remote, &candidate, base).await {
                TransferOutcome::Downloaded(path) => {
                    info!(folder = folder; "downloaded {} to {}", candidate.name(), path.display());
                    result.transferred_names.push(candidate.name().clone());
                    downloaded.push(candidate);
                }
                TransferOutcome::Failed(e) => {
                    error!(folder = folder; "downloading {} failed: {e}", candidate.name());
                    result.failed_names.push(candidate.name().clone());
                }
            }
        }

        if self.delete_remote {
            let report = remover::remove(remote, folder, &downloaded).await;
            if !report.failed().is_empty() {
                warn!(
                    "{} file(s) stay in {folder} and will be downloaded again next run",
                    report.failed().len()
                );
            }
        } else if !downloaded.is_empty() {
            info!("keeping remote copies in {folder}");
        }

        if !result.failed_names.is_empty() {
            error!(
                "failed to harvest from {folder}: {}",
                result.failed_names.join(", ")
            );
        }
        result
    }
}
