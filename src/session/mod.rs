#[cfg(test)]
pub mod test_server;

use std::fmt::Debug;

use log::{debug, error, info, warn};
use tokio::io::AsyncWrite;

use crate::{
    config::Credential,
    error::{ProtocolError, SessionError},
    ftp::{Command, Connection, ConnectionOptions, ReplyCode},
    remote::Remote,
};

/// One logged in control connection, used by a single credential for the
/// whole run. Call [`disconnect`](Self::disconnect) when done.
pub struct Session {
    identity: String,
    connection: Option<Connection>,
}

impl Session {
    pub async fn connect(
        options: &ConnectionOptions,
        credential: &Credential,
    ) -> Result<Self, SessionError> {
        let identity = credential.identity();
        match login(options, credential).await {
            Ok(connection) => {
                info!(identity = identity.as_str(); "logged in on {}", options.host());
                Ok(Self {
                    identity: identity.clone(),
                    connection: Some(connection),
                })
            }
            Err(e) => {
                error!("{e}");
                Err(e)
            }
        }
    }

    /// False once logged out or after the control connection broke.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Says goodbye to the server. Calling this again is a no-op, and a
    /// failing `QUIT` is only logged.
    pub async fn disconnect(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };
        match connection.send(&Command::Quit).await {
            Ok(reply) => debug!("{reply}"),
            Err(e) => warn!("closing session of {} failed: {e}", self.identity),
        }
        info!(identity = self.identity.as_str(); "logged out");
    }

    fn connection(&mut self) -> Result<&mut Connection, ProtocolError> {
        self.connection.as_mut().ok_or(ProtocolError::NotConnected)
    }

    /// Drops the connection when `result` leaves it out of step with the
    /// server, so later calls fail with `NotConnected` instead of reading
    /// stale replies.
    fn settle<T>(&mut self, result: Result<T, ProtocolError>) -> Result<T, ProtocolError> {
        if let Err(e) = &result
            && e.breaks_control()
            && self.connection.take().is_some()
        {
            warn!(identity = self.identity.as_str(); "abandoning connection: {e}");
        }
        result
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("connected", &self.connection.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.connection.is_some() {
            warn!(
                "session of {} dropped without logging out, closing connection",
                self.identity
            );
        }
    }
}

async fn login(
    options: &ConnectionOptions,
    credential: &Credential,
) -> Result<Connection, SessionError> {
    let identity = credential.identity();
    let link = |source| SessionError::link(identity, source);

    let (mut connection, greeting) = Connection::connect(options).await.map_err(link)?;
    debug!("{greeting}");
    let mut reply = connection
        .send(&Command::User(identity.clone()))
        .await
        .map_err(link)?;
    if reply.code() == ReplyCode::NEED_PASSWORD {
        reply = connection
            .send(&Command::Pass(credential.secret().clone()))
            .await
            .map_err(link)?;
    }
    if reply.code().is_permanent_negative() {
        return Err(SessionError::Auth {
            identity: identity.clone(),
            reply,
        });
    }
    if !reply.code().is_completion() {
        return Err(link(ProtocolError::from_reply(reply)));
    }

    connection.protect_data_connections().await.map_err(link)?;
    connection
        .execute(&Command::TypeImage)
        .await
        .map_err(link)?;
    Ok(connection)
}

/// Splits an `NLST` listing into names, one per line.
fn split_listing(listing: &[u8]) -> Vec<Vec<u8>> {
    listing
        .split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(<[u8]>::to_vec)
        .collect()
}

/// Servers answer `NLST` on an empty directory with one of these, but a
/// `550` that reads like an access problem stays an error.
fn lists_nothing(error: &ProtocolError) -> bool {
    matches!(
        error,
        ProtocolError::Rejected(reply)
            if matches!(reply.code(), ReplyCode::FILE_BUSY | ReplyCode::FILE_UNAVAILABLE)
    ) && !error.is_permission_denied()
}

impl Remote for Session {
    async fn change_dir(&mut self, folder: &str) -> Result<(), ProtocolError> {
        let result = self
            .connection()?
            .execute(&Command::ChangeDir(folder.to_string()))
            .await;
        self.settle(result)?;
        Ok(())
    }

    async fn list(&mut self) -> Result<Vec<Vec<u8>>, ProtocolError> {
        let mut listing = Vec::new();
        let result = self
            .connection()?
            .transfer_into(&Command::NameList, &mut listing)
            .await;
        match self.settle(result) {
            Ok(_) => Ok(split_listing(&listing)),
            Err(e) if lists_nothing(&e) => {
                debug!("treating {e} as empty listing");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn retrieve<W>(&mut self, name: &[u8], sink: &mut W) -> Result<u64, ProtocolError>
    where
        W: AsyncWrite + Unpin,
    {
        let result = self
            .connection()?
            .transfer_into(&Command::Retrieve(name.to_vec()), sink)
            .await;
        self.settle(result)
    }

    async fn delete(&mut self, name: &[u8]) -> Result<(), ProtocolError> {
        let result = self
            .connection()?
            .execute(&Command::Delete(name.to_vec()))
            .await;
        self.settle(result)?;
        Ok(())
    }
}
