use std::{
    collections::{HashMap, HashSet},
    io,
};

use tokio::io::{AsyncWrite, AsyncWriteExt as _};

use crate::{
    error::ProtocolError,
    ftp::{Reply, ReplyCode},
    remote::Remote,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockCommand {
    ChangeDir(String),
    List,
    Retrieve(Vec<u8>),
    Delete(Vec<u8>),
}

/// In-memory server with folders of named files.
#[derive(Debug, Default)]
pub struct MockRemote {
    folders: HashMap<String, Vec<(Vec<u8>, Vec<u8>)>>,
    denied: HashSet<String>,
    broken: HashSet<Vec<u8>>,
    undeletable: HashSet<Vec<u8>>,
    current: Option<String>,
    commands: Vec<MockCommand>,
}

fn unavailable(text: &str) -> ProtocolError {
    ProtocolError::Rejected(Reply::single(ReplyCode::FILE_UNAVAILABLE, text))
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(mut self, folder: &str) -> Self {
        self.folders.entry(folder.to_string()).or_default();
        self
    }

    /// Appends a file to `folder`, creating the folder if needed.
    pub fn with_file(mut self, folder: &str, name: &[u8], content: &[u8]) -> Self {
        self.folders
            .entry(folder.to_string())
            .or_default()
            .push((name.to_vec(), content.to_vec()));
        self
    }

    pub fn deny(mut self, folder: &str) -> Self {
        self.denied.insert(folder.to_string());
        self
    }

    /// Retrieving `name` fails halfway through the transfer.
    pub fn break_retrieval(mut self, name: &[u8]) -> Self {
        self.broken.insert(name.to_vec());
        self
    }

    pub fn forbid_deletion(mut self, name: &[u8]) -> Self {
        self.undeletable.insert(name.to_vec());
        self
    }

    pub fn commands(&self) -> &[MockCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn deleted(&self) -> Vec<Vec<u8>> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                MockCommand::Delete(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn remaining(&self, folder: &str) -> Vec<Vec<u8>> {
        self.folders
            .get(folder)
            .map(|files| files.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    fn current_files(&mut self) -> Result<&mut Vec<(Vec<u8>, Vec<u8>)>, ProtocolError> {
        let current = self.current.as_ref().ok_or(ProtocolError::NotConnected)?;
        self.folders
            .get_mut(current)
            .ok_or_else(|| unavailable("No such file or directory"))
    }
}

impl Remote for MockRemote {
    async fn change_dir(&mut self, folder: &str) -> Result<(), ProtocolError> {
        self.commands.push(MockCommand::ChangeDir(folder.to_string()));
        if self.denied.contains(folder) {
            return Err(unavailable("Permission denied"));
        }
        if !self.folders.contains_key(folder) {
            return Err(unavailable("No such file or directory"));
        }
        self.current = Some(folder.to_string());
        Ok(())
    }

    async fn list(&mut self) -> Result<Vec<Vec<u8>>, ProtocolError> {
        self.commands.push(MockCommand::List);
        Ok(self
            .current_files()?
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn retrieve<W>(&mut self, name: &[u8], sink: &mut W) -> Result<u64, ProtocolError>
    where
        W: AsyncWrite + Unpin,
    {
        self.commands.push(MockCommand::Retrieve(name.to_vec()));
        let broken = self.broken.contains(name);
        let content = self
            .current_files()?
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| unavailable("No such file"))?;
        if broken {
            sink.write_all(&content[..content.len() / 2])
                .await
                .map_err(ProtocolError::LocalWrite)?;
            return Err(ProtocolError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "data connection reset",
            )));
        }
        sink.write_all(&content)
            .await
            .map_err(ProtocolError::LocalWrite)?;
        sink.flush().await.map_err(ProtocolError::LocalWrite)?;
        Ok(content.len() as u64)
    }

    async fn delete(&mut self, name: &[u8]) -> Result<(), ProtocolError> {
        self.commands.push(MockCommand::Delete(name.to_vec()));
        if self.undeletable.contains(name) {
            return Err(unavailable("Permission denied"));
        }
        let files = self.current_files()?;
        let position = files
            .iter()
            .position(|(candidate, _)| candidate == name)
            .ok_or_else(|| unavailable("No such file"))?;
        files.remove(position);
        Ok(())
    }
}
