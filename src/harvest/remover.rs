use std::collections::HashSet;

use derive_getters::Getters;
use log::{error, info, warn};

use crate::{error::FolderError, harvest::lister::Candidate, remote::Remote};

#[derive(Debug, Default, PartialEq, Eq, Getters)]
pub struct RemovalReport {
    deleted: Vec<String>,
    missing: Vec<String>,
    failed: Vec<String>,
}

/// Deletes `candidates` from `folder`, skipping any that are no longer
/// listed there. Failures are logged and reported, never returned.
pub async fn remove<R: Remote>(
    remote: &mut R,
    folder: &str,
    candidates: &[Candidate],
) -> RemovalReport {
    let mut report = RemovalReport::default();
    if candidates.is_empty() {
        return report;
    }

    let existing = match enter_and_list(remote, folder).await {
        Ok(existing) => existing,
        Err(e) => {
            error!("cannot clean up {folder}: {e}");
            report.failed = candidates.iter().map(|c| c.name().clone()).collect();
            return report;
        }
    };

    for candidate in candidates {
        let name = candidate.name();
        if !existing.contains(candidate.raw_name().as_slice()) {
            warn!("{name} is no longer in {folder}, not deleting it");
            report.missing.push(name.clone());
            continue;
        }
        match remote.delete(candidate.raw_name()).await {
            Ok(()) => {
                info!(folder = folder; "deleted {name}");
                report.deleted.push(name.clone());
            }
            Err(e) => {
                error!("deleting {name} from {folder} failed: {e}");
                report.failed.push(name.clone());
            }
        }
    }
    report
}

async fn enter_and_list<R: Remote>(
    remote: &mut R,
    folder: &str,
) -> Result<HashSet<Vec<u8>>, FolderError> {
    remote
        .change_dir(folder)
        .await
        .map_err(|e| FolderError::classify(folder, e))?;
    let entries = remote
        .list()
        .await
        .map_err(|e| FolderError::classify(folder, e))?;
    Ok(entries.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use rstest::*;

    use super::*;
    use crate::remote::mock::MockRemote;

    fn candidate(name: &str) -> Candidate {
        Candidate::new(name.as_bytes().to_vec(), name.to_string())
    }

    #[rstest]
    #[tokio::test]
    async fn test_empty_set_issues_no_command() {
        let mut remote = MockRemote::new().with_file("/incoming", b"a.pdf", b"a");

        let report = remove(&mut remote, "/incoming", &[]).await;

        assert_eq!(RemovalReport::default(), report);
        assert_is_empty!(remote.commands());
    }

    #[rstest]
    #[tokio::test]
    async fn test_only_requested_names_are_deleted() {
        let mut remote = MockRemote::new()
            .with_file("/incoming", b"a.pdf", b"a")
            .with_file("/incoming", b"b.pdf", b"b")
            .with_file("/incoming", b"c.pdf", b"c");

        let report = remove(
            &mut remote,
            "/incoming",
            &[candidate("a.pdf"), candidate("c.pdf")],
        )
        .await;

        assert_eq!(&vec!["a.pdf".to_string(), "c.pdf".to_string()], report.deleted());
        assert_eq!(vec![b"b.pdf".to_vec()], remote.remaining("/incoming"));
    }

    #[rstest]
    #[tokio::test]
    async fn test_vanished_name_is_skipped() {
        let mut remote = MockRemote::new().with_file("/incoming", b"a.pdf", b"a");

        let report = remove(
            &mut remote,
            "/incoming",
            &[candidate("gone.pdf"), candidate("a.pdf")],
        )
        .await;

        assert_eq!(&vec!["gone.pdf".to_string()], report.missing());
        assert_eq!(&vec!["a.pdf".to_string()], report.deleted());
        assert_eq!(vec![b"a.pdf".to_vec()], remote.deleted());
    }

    #[rstest]
    #[tokio::test]
    async fn test_refused_deletion_does_not_stop_the_rest() {
        let mut remote = MockRemote::new()
            .with_file("/incoming", b"a.pdf", b"a")
            .with_file("/incoming", b"b.pdf", b"b")
            .forbid_deletion(b"a.pdf");

        let report = remove(
            &mut remote,
            "/incoming",
            &[candidate("a.pdf"), candidate("b.pdf")],
        )
        .await;

        assert_eq!(&vec!["a.pdf".to_string()], report.failed());
        assert_eq!(&vec!["b.pdf".to_string()], report.deleted());
        assert_eq!(vec![b"a.pdf".to_vec()], remote.remaining("/incoming"));
    }

    #[rstest]
    #[tokio::test]
    async fn test_inaccessible_folder_fails_every_name() {
        let mut remote = MockRemote::new()
            .with_file("/incoming", b"a.pdf", b"a")
            .deny("/incoming");

        let report = remove(&mut remote, "/incoming", &[candidate("a.pdf")]).await;

        assert_eq!(&vec!["a.pdf".to_string()], report.failed());
        assert_is_empty!(remote.deleted());
    }
}
