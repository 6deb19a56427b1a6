use std::{
    io,
    path::{Component, Path, PathBuf},
    process,
    time::{SystemTime, UNIX_EPOCH},
};

use log::{debug, warn};
use rustix::system::uname;
use tokio::fs::{self, File, OpenOptions};

use crate::{error::TransferError, harvest::lister::Candidate, remote::Remote};

#[derive(Debug)]
pub enum TransferOutcome {
    Downloaded(PathBuf),
    Failed(TransferError),
}

impl TransferOutcome {
    #[cfg(test)]
    pub fn is_downloaded(&self) -> bool {
        matches!(self, TransferOutcome::Downloaded(_))
    }
}

/// Downloads `candidate` into `base`. The destination either receives the
/// complete file or stays untouched; nothing partial is left behind.
pub async fn download<R: Remote>(
    remote: &mut R,
    candidate: &Candidate,
    base: &Path,
) -> TransferOutcome {
    match try_download(remote, candidate, base).await {
        Ok((destination, size)) => {
            debug!("received {size} bytes for {}", candidate.name());
            TransferOutcome::Downloaded(destination)
        }
        Err(e) => TransferOutcome::Failed(e),
    }
}

async fn try_download<R: Remote>(
    remote: &mut R,
    candidate: &Candidate,
    base: &Path,
) -> Result<(PathBuf, u64), TransferError> {
    let destination = destination(base, candidate.name())?;
    let parent = destination.parent().unwrap_or(base);
    fs::create_dir_all(parent)
        .await
        .map_err(TransferError::LocalIo)?;

    let temp = temp_sibling(&destination);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp)
        .await
        .map_err(TransferError::LocalIo)?;

    match receive(remote, candidate, &mut file, &temp, &destination).await {
        Ok(size) => Ok((destination, size)),
        Err(e) => {
            drop(file);
            discard(&temp).await;
            Err(e)
        }
    }
}

async fn receive<R: Remote>(
    remote: &mut R,
    candidate: &Candidate,
    file: &mut File,
    temp: &Path,
    destination: &Path,
) -> Result<u64, TransferError> {
    let size = remote.retrieve(candidate.raw_name(), file).await?;
    file.sync_all().await.map_err(TransferError::LocalIo)?;
    fs::rename(temp, destination)
        .await
        .map_err(TransferError::LocalIo)?;
    Ok(size)
}

async fn discard(temp: &Path) {
    match fs::remove_file(temp).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove {}: {e}", temp.display()),
    }
}

/// Joins `name` onto `base`, refusing anything that could land outside it.
fn destination(base: &Path, name: &str) -> Result<PathBuf, TransferError> {
    let relative = Path::new(name);
    let mut components = relative.components().peekable();
    if components.peek().is_none()
        || !components.all(|component| {
            matches!(component, Component::Normal(_) | Component::CurDir)
        })
        || relative.file_name().is_none()
    {
        return Err(TransferError::UnsafeName(name.to_string()));
    }
    Ok(base.join(relative))
}

fn temp_sibling(destination: &Path) -> PathBuf {
    let file_name = destination
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    destination.with_file_name(format!(".{file_name}.{}.part", unique_suffix()))
}

fn unique_suffix() -> String {
    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = time.as_secs();
    let nanos = time.subsec_nanos();
    let hostname = uname();
    let hostname = hostname.nodename().to_string_lossy();
    let pid = process::id();
    format!("{secs}.P{pid}N{nanos}.{hostname}")
}
