use derive_getters::Getters;
use log::{debug, info};

use crate::{error::FolderError, harvest::name::decode_name, remote::Remote};

/// A listed file selected for harvesting.
#[derive(Clone, Debug, PartialEq, Eq, Getters)]
pub struct Candidate {
    raw_name: Vec<u8>,
    name: String,
}

impl Candidate {
    pub fn new(raw_name: Vec<u8>, name: String) -> Self {
        Self { raw_name, name }
    }
}

/// Matches names by extension, ignoring case.
#[derive(Clone, Debug)]
pub struct ExtensionFilter {
    extension: String,
}

impl ExtensionFilter {
    pub fn new(extension: &str) -> Self {
        let extension = extension.to_lowercase();
        let extension = if extension.starts_with('.') {
            extension
        } else {
            format!(".{extension}")
        };
        Self { extension }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn matches(&self, name: &str) -> bool {
        name.to_lowercase().ends_with(&self.extension)
    }
}

/// Enters `folder` and returns the matching entries in server order.
pub async fn list<R: Remote>(
    remote: &mut R,
    folder: &str,
    filter: &ExtensionFilter,
) -> Result<Vec<Candidate>, FolderError> {
    remote
        .change_dir(folder)
        .await
        .map_err(|e| FolderError::classify(folder, e))?;
    let entries = remote
        .list()
        .await
        .map_err(|e| FolderError::classify(folder, e))?;
    let listed = entries.len();

    let candidates: Vec<Candidate> = entries
        .into_iter()
        .filter_map(|raw_name| {
            let name = decode_name(&raw_name)?;
            if filter.matches(&name) {
                Some(Candidate::new(raw_name, name))
            } else {
                debug!("ignoring {name}");
                None
            }
        })
        .collect();
    info!(
        "{folder}: {} of {listed} entries match {}",
        candidates.len(),
        filter.extension()
    );
    Ok(candidates)
}
