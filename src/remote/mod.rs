#[cfg(test)]
pub mod mock;

use tokio::io::AsyncWrite;

use crate::error::ProtocolError;

/// The command primitives harvesting needs from a logged in server.
///
/// Names are raw bytes exactly as the server listed them.
pub trait Remote {
    async fn change_dir(&mut self, folder: &str) -> Result<(), ProtocolError>;

    /// Names in the current directory, in server order.
    async fn list(&mut self) -> Result<Vec<Vec<u8>>, ProtocolError>;

    /// Streams `name` into `sink` and returns the number of bytes written.
    async fn retrieve<W>(&mut self, name: &[u8], sink: &mut W) -> Result<u64, ProtocolError>
    where
        W: AsyncWrite + Unpin;

    async fn delete(&mut self, name: &[u8]) -> Result<(), ProtocolError>;
}
