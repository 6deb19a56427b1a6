use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader},
    net::{TcpListener, TcpStream},
    time::sleep,
};

#[derive(Default)]
struct ServerState {
    users: HashMap<String, String>,
    folders: HashMap<String, Vec<(Vec<u8>, Vec<u8>)>>,
    unlistable: HashSet<String>,
    late: HashMap<Vec<u8>, Duration>,
    commands: Vec<String>,
}

/// Scripted FTP server on a loopback port. Speaks just enough of the
/// protocol to harvest from it: login, `PASV`, `CWD`, `NLST`, `RETR`, `DELE`.
#[derive(Clone)]
pub struct TestServer {
    address: SocketAddr,
    state: Arc<Mutex<ServerState>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("test server should bind");
        let address = listener
            .local_addr()
            .expect("test server should have an address");
        let server = Self {
            address,
            state: Arc::default(),
        };
        let handle = server.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handle = handle.clone();
                tokio::spawn(async move { handle.serve(stream).await });
            }
        });
        server
    }

    pub fn with_user(self, user: &str, password: &str) -> Self {
        self.state()
            .users
            .insert(user.to_string(), password.to_string());
        self
    }

    pub fn with_folder(self, folder: &str) -> Self {
        self.state().folders.entry(folder.to_string()).or_default();
        self
    }

    pub fn with_file(self, folder: &str, name: &[u8], content: &[u8]) -> Self {
        self.state()
            .folders
            .entry(folder.to_string())
            .or_default()
            .push((name.to_vec(), content.to_vec()));
        self
    }

    /// Answers `NLST` in `folder` with `550 Permission denied`.
    pub fn forbid_listing(self, folder: &str) -> Self {
        self.state().unlistable.insert(folder.to_string());
        self
    }

    /// Holds back the `226` after sending `name` for `delay`.
    pub fn delay_completion(self, name: &[u8], delay: Duration) -> Self {
        self.state().late.insert(name.to_vec(), delay);
        self
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    /// Every command received so far, `PASS` arguments masked.
    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    pub fn remaining(&self, folder: &str) -> Vec<Vec<u8>> {
        self.state()
            .folders
            .get(folder)
            .map(|files| files.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().expect("test server state should not be poisoned")
    }

    async fn serve(self, stream: TcpStream) {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut user = String::new();
        let mut folder = String::from("/");
        let mut passive: Option<TcpListener> = None;

        let reply = |code: u16, text: &str| format!("{code} {text}\r\n");
        if writer
            .write_all(reply(220, "test server ready").as_bytes())
            .await
            .is_err()
        {
            return;
        }

        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            while matches!(line.last(), Some(b'\n' | b'\r')) {
                line.pop();
            }
            let (verb, argument) = match line.iter().position(|b| *b == b' ') {
                Some(space) => (&line[..space], line[space + 1..].to_vec()),
                None => (&line[..], Vec::new()),
            };
            let verb = String::from_utf8_lossy(verb).to_uppercase();
            let logged = if verb == "PASS" {
                "PASS <password>".to_string()
            } else {
                String::from_utf8_lossy(&line).to_string()
            };
            self.state().commands.push(logged);

            let mut data: Option<Vec<u8>> = None;
            let mut completion_delay = Duration::ZERO;
            let response = match verb.as_str() {
                "USER" => {
                    user = String::from_utf8_lossy(&argument).to_string();
                    reply(331, "password required")
                }
                "PASS" => {
                    let password = String::from_utf8_lossy(&argument).to_string();
                    if self.state().users.get(&user) == Some(&password) {
                        reply(230, "logged in")
                    } else {
                        reply(530, "login incorrect")
                    }
                }
                "TYPE" => reply(200, "type set"),
                "PASV" => {
                    let listener = TcpListener::bind("127.0.0.1:0")
                        .await
                        .expect("data listener should bind");
                    let port = listener
                        .local_addr()
                        .expect("data listener should have an address")
                        .port();
                    passive = Some(listener);
                    reply(
                        227,
                        &format!(
                            "Entering Passive Mode (10,0,0,1,{},{})",
                            port / 256,
                            port % 256
                        ),
                    )
                }
                "CWD" => {
                    let target = String::from_utf8_lossy(&argument).to_string();
                    if self.state().folders.contains_key(&target) {
                        folder = target;
                        reply(250, "directory changed")
                    } else {
                        reply(550, "no such directory")
                    }
                }
                "NLST" if self.state().unlistable.contains(&folder) => {
                    reply(550, "Permission denied")
                }
                "NLST" => {
                    let names: Vec<Vec<u8>> = self
                        .state()
                        .folders
                        .get(&folder)
                        .map(|files| files.iter().map(|(name, _)| name.clone()).collect())
                        .unwrap_or_default();
                    if names.is_empty() {
                        reply(550, "no files found")
                    } else {
                        let mut listing = Vec::new();
                        for name in names {
                            listing.extend_from_slice(&name);
                            listing.extend_from_slice(b"\r\n");
                        }
                        data = Some(listing);
                        reply(150, "here comes the listing")
                    }
                }
                "RETR" => {
                    let content = self.state().folders.get(&folder).and_then(|files| {
                        files
                            .iter()
                            .find(|(name, _)| *name == argument)
                            .map(|(_, content)| content.clone())
                    });
                    if let Some(content) = content {
                        data = Some(content);
                        completion_delay = self
                            .state()
                            .late
                            .get(&argument)
                            .copied()
                            .unwrap_or_default();
                        reply(150, "opening data connection")
                    } else {
                        reply(550, "no such file")
                    }
                }
                "DELE" => {
                    let mut state = self.state();
                    let files = state.folders.entry(folder.clone()).or_default();
                    if let Some(position) = files.iter().position(|(name, _)| *name == argument) {
                        files.remove(position);
                        reply(250, "deleted")
                    } else {
                        reply(550, "no such file")
                    }
                }
                "QUIT" => {
                    let _ = writer.write_all(reply(221, "bye").as_bytes()).await;
                    return;
                }
                _ => reply(502, "command not implemented"),
            };

            if writer.write_all(response.as_bytes()).await.is_err() {
                return;
            }
            if let Some(data) = data {
                let Some(listener) = passive.take() else {
                    return;
                };
                let Ok((mut channel, _)) = listener.accept().await else {
                    return;
                };
                let _ = channel.write_all(&data).await;
                let _ = channel.shutdown().await;
                drop(channel);
                sleep(completion_delay).await;
                if writer
                    .write_all(reply(226, "transfer complete").as_bytes())
                    .await
                    .is_err()
                {
                    return;
                }
            } else if verb != "PASV" {
                passive = None;
            }
        }
    }
}
