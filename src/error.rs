use std::{io, path::PathBuf};

use thiserror::Error;
use tokio_native_tls::native_tls;

use crate::ftp::{Reply, ReplyCode};

/// Failures on the wire, below any harvesting semantics.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection error: {0}")]
    Io(#[from] io::Error),
    #[error("writing received data failed: {0}")]
    LocalWrite(#[source] io::Error),
    #[error("timed out while {0}")]
    Timeout(&'static str),
    #[error("tls error: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("malformed reply: {0:?}")]
    MalformedReply(String),
    #[error("server closed the control connection")]
    ConnectionClosed,
    #[error("server rejected command: {0}")]
    Rejected(Reply),
    #[error("unexpected reply: {0}")]
    UnexpectedReply(Reply),
    #[error("refusing to send line break in {0}")]
    IllegalArgument(String),
    #[error("session is not connected")]
    NotConnected,
}

impl ProtocolError {
    pub fn from_reply(reply: Reply) -> Self {
        if reply.code().is_negative() {
            Self::Rejected(reply)
        } else {
            Self::UnexpectedReply(reply)
        }
    }

    /// Network trouble or a server asking to try again later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(_) | Self::Timeout(_) | Self::ConnectionClosed => true,
            Self::Rejected(reply) => reply.code().is_transient_negative(),
            _ => false,
        }
    }

    /// A permanent rejection that reads like an access problem rather than a
    /// missing path. FTP reuses `550` for both, so the reply text decides.
    pub fn is_permission_denied(&self) -> bool {
        let Self::Rejected(reply) = self else {
            return false;
        };
        match reply.code() {
            ReplyCode::NOT_LOGGED_IN
            | ReplyCode::NEED_ACCOUNT_FOR_STORING
            | ReplyCode::NAME_NOT_ALLOWED => true,
            ReplyCode::FILE_UNAVAILABLE => {
                let text = reply.text().to_lowercase();
                text.contains("denied") || text.contains("permission") || text.contains("access")
            }
            _ => false,
        }
    }

    /// The control connection may hold a reply nobody has read, or none at
    /// all. Commands sent after this would be paired with the wrong replies.
    pub fn breaks_control(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Tls(_)
                | Self::Timeout(_)
                | Self::MalformedReply(_)
                | Self::ConnectionClosed
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Rejected(reply) if reply.code() == ReplyCode::FILE_UNAVAILABLE)
            && !self.is_permission_denied()
    }
}

/// Why a session could not be established for one credential.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("credentials for {identity} rejected: {reply}")]
    Auth { identity: String, reply: Reply },
    #[error("temporary failure connecting as {identity}: {source}")]
    TransientLink {
        identity: String,
        source: ProtocolError,
    },
    #[error("unexpected failure connecting as {identity}: {source}")]
    Unexpected {
        identity: String,
        source: ProtocolError,
    },
}

impl SessionError {
    /// Classifies a failure that happened while connecting or preparing the
    /// session, i.e. anything but a rejected login.
    pub fn link(identity: &str, source: ProtocolError) -> Self {
        let identity = identity.to_string();
        if source.is_transient() {
            Self::TransientLink { identity, source }
        } else {
            Self::Unexpected { identity, source }
        }
    }
}

/// Failure to access a remote folder. Scoped to that folder's batch.
#[derive(Debug, Error)]
pub enum FolderError {
    #[error("remote folder {folder} not found: {source}")]
    NotFound {
        folder: String,
        source: ProtocolError,
    },
    #[error("access to remote folder {folder} denied: {source}")]
    Permission {
        folder: String,
        source: ProtocolError,
    },
    #[error("temporary failure accessing remote folder {folder}: {source}")]
    TransientLink {
        folder: String,
        source: ProtocolError,
    },
    #[error("unexpected failure accessing remote folder {folder}: {source}")]
    Unexpected {
        folder: String,
        source: ProtocolError,
    },
}

impl FolderError {
    pub fn classify(folder: &str, source: ProtocolError) -> Self {
        let folder = folder.to_string();
        if source.is_permission_denied() {
            Self::Permission { folder, source }
        } else if source.is_not_found() {
            Self::NotFound { folder, source }
        } else if source.is_transient() {
            Self::TransientLink { folder, source }
        } else {
            Self::Unexpected { folder, source }
        }
    }
}

/// Failure to harvest a single file. Scoped to that file.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("remote error: {0}")]
    Remote(#[source] ProtocolError),
    #[error("local write failed: {0}")]
    LocalIo(#[source] io::Error),
    #[error("{0:?} would be stored outside of the local base folder")]
    UnsafeName(String),
}

impl From<ProtocolError> for TransferError {
    fn from(value: ProtocolError) -> Self {
        match value {
            ProtocolError::LocalWrite(e) => Self::LocalIo(e),
            other => Self::Remote(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot determine configuration location: {0} is not set")]
    NoLocation(&'static str),
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("folder mapping #{index} is malformed: {reason}")]
    MalformedMapping { index: usize, reason: String },
    #[error("password command for {identity} failed: {reason}")]
    PasswordCommand { identity: String, reason: String },
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    fn rejected(code: u16, text: &str) -> ProtocolError {
        ProtocolError::Rejected(Reply::single(
            ReplyCode::new(code).expect("test code should be valid"),
            text,
        ))
    }

    #[rstest]
    fn test_folder_error_separates_missing_from_denied() {
        assert!(matches!(
            FolderError::classify("/a", rejected(550, "No such file or directory")),
            FolderError::NotFound { .. }
        ));
        assert!(matches!(
            FolderError::classify("/a", rejected(550, "Permission denied")),
            FolderError::Permission { .. }
        ));
        assert!(matches!(
            FolderError::classify("/a", rejected(530, "Not logged in")),
            FolderError::Permission { .. }
        ));
    }

    #[rstest]
    fn test_folder_error_treats_busy_and_network_as_transient() {
        assert!(matches!(
            FolderError::classify("/a", rejected(421, "Too many users")),
            FolderError::TransientLink { .. }
        ));
        assert!(matches!(
            FolderError::classify("/a", ProtocolError::Timeout("waiting for reply")),
            FolderError::TransientLink { .. }
        ));
        assert!(matches!(
            FolderError::classify("/a", ProtocolError::MalformedReply("x".to_string())),
            FolderError::Unexpected { .. }
        ));
    }

    #[rstest]
    #[case(ProtocolError::Timeout("waiting for reply"), true)]
    #[case(ProtocolError::ConnectionClosed, true)]
    #[case(ProtocolError::MalformedReply("2xx".to_string()), true)]
    #[case(ProtocolError::Io(io::ErrorKind::ConnectionReset.into()), true)]
    #[case(rejected(550, "Permission denied"), false)]
    #[case(ProtocolError::LocalWrite(io::Error::other("disk full")), false)]
    #[case(ProtocolError::NotConnected, false)]
    fn test_only_desyncing_errors_break_control(
        #[case] error: ProtocolError,
        #[case] breaks: bool,
    ) {
        assert_eq!(breaks, error.breaks_control());
    }

    #[rstest]
    fn test_local_write_failures_become_local_io() {
        let error = TransferError::from(ProtocolError::LocalWrite(io::Error::other("disk full")));
        assert!(matches!(error, TransferError::LocalIo(_)));
        let error = TransferError::from(ProtocolError::ConnectionClosed);
        assert!(matches!(error, TransferError::Remote(_)));
    }
}
