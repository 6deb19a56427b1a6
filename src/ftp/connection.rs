use std::{future::Future, net::SocketAddr, time::Duration};

use derive_builder::Builder;
use derive_getters::Getters;
use futures::{SinkExt as _, StreamExt as _};
use log::{debug, trace};
use nom::Finish as _;
use serde::Deserialize;
use tokio::{
    io::{AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _},
    net::TcpStream,
    time::timeout,
};
use tokio_native_tls::{TlsConnector, native_tls};
use tokio_util::codec::Framed;

use crate::{
    error::ProtocolError,
    ftp::{
        codec::FtpCodec,
        command::Command,
        parser::{extended_passive_port, passive_address},
        reply::{Reply, ReplyCode},
        stream::MaybeTlsStream,
    },
};

pub type ControlStream = Framed<MaybeTlsStream, FtpCodec>;

const DATA_BUFFER_SIZE: usize = 64 * 1024;

/// How the data connection address is negotiated. Both are passive: the
/// client always opens the data connection.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PassiveMode {
    #[default]
    Pasv,
    Epsv,
}

#[derive(Builder, Clone, Debug, Getters)]
pub struct ConnectionOptions {
    #[builder(setter(into))]
    host: String,
    #[builder(default = "21")]
    #[getter(skip)]
    port: u16,
    #[builder(default)]
    #[getter(skip)]
    tls: bool,
    #[builder(default)]
    #[getter(skip)]
    passive_mode: PassiveMode,
    #[builder(default)]
    #[getter(skip)]
    trust_pasv_address: bool,
    #[builder(default = "Duration::from_secs(30)")]
    #[getter(skip)]
    timeout: Duration,
}

impl ConnectionOptions {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    pub fn passive_mode(&self) -> PassiveMode {
        self.passive_mode
    }

    pub fn trust_pasv_address(&self) -> bool {
        self.trust_pasv_address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

async fn within<T, E>(
    limit: Duration,
    operation: &'static str,
    future: impl Future<Output = Result<T, E>>,
) -> Result<T, ProtocolError>
where
    ProtocolError: From<E>,
{
    timeout(limit, future)
        .await
        .map_err(|_| ProtocolError::Timeout(operation))?
        .map_err(ProtocolError::from)
}

async fn receive(stream: &mut ControlStream, limit: Duration) -> Result<Reply, ProtocolError> {
    let reply = timeout(limit, stream.next())
        .await
        .map_err(|_| ProtocolError::Timeout("waiting for reply"))?
        .ok_or(ProtocolError::ConnectionClosed)??;
    trace!("< {reply}");
    Ok(reply)
}

async fn exchange(
    stream: &mut ControlStream,
    limit: Duration,
    command: &Command,
) -> Result<Reply, ProtocolError> {
    trace!("> {command}");
    within(limit, "sending command", stream.send(command)).await?;
    receive(stream, limit).await
}

async fn copy_within<W>(
    data: &mut MaybeTlsStream,
    sink: &mut W,
    limit: Duration,
) -> Result<u64, ProtocolError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0; DATA_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let read = within(limit, "receiving data", data.read(&mut buffer)).await?;
        if read == 0 {
            break;
        }
        sink.write_all(&buffer[..read])
            .await
            .map_err(ProtocolError::LocalWrite)?;
        total += read as u64;
    }
    sink.flush().await.map_err(ProtocolError::LocalWrite)?;
    Ok(total)
}

/// One control connection. Only a single command is ever in flight, which
/// `&mut self` on every operation enforces.
pub struct Connection {
    stream: ControlStream,
    host: String,
    peer: SocketAddr,
    timeout: Duration,
    passive_mode: PassiveMode,
    trust_pasv_address: bool,
    data_tls: Option<TlsConnector>,
}

impl Connection {
    /// Opens the control connection and waits for the server greeting. With
    /// `tls` set the connection is upgraded through `AUTH TLS` before
    /// returning, so credentials never travel in the clear.
    pub async fn connect(options: &ConnectionOptions) -> Result<(Self, Reply), ProtocolError> {
        let limit = options.timeout();
        let host = options.host().as_str();
        debug!("connecting to {host}:{}", options.port());
        let tcp = within(limit, "connecting", TcpStream::connect((host, options.port()))).await?;
        let peer = tcp.peer_addr()?;
        let mut stream = Framed::new(MaybeTlsStream::Plain(tcp), FtpCodec::default());

        let mut greeting = receive(&mut stream, limit).await?;
        while greeting.code() == ReplyCode::SERVICE_READY_SOON {
            debug!("server not ready yet: {greeting}");
            greeting = receive(&mut stream, limit).await?;
        }
        if greeting.code() != ReplyCode::SERVICE_READY {
            return Err(ProtocolError::from_reply(greeting));
        }
        trace!("greeting = {greeting}");

        let data_tls = if options.tls() {
            let reply = exchange(&mut stream, limit, &Command::AuthTls).await?;
            if reply.code() != ReplyCode::AUTH_ACCEPTED {
                return Err(ProtocolError::from_reply(reply));
            }
            let connector = TlsConnector::from(native_tls::TlsConnector::new()?);
            debug!("upgrading control connection to tls");
            let upgraded = within(
                limit,
                "tls handshake",
                stream.into_inner().upgrade(&connector, host),
            )
            .await?;
            stream = Framed::new(upgraded, FtpCodec::default());
            Some(connector)
        } else {
            None
        };

        Ok((
            Self {
                stream,
                host: host.to_string(),
                peer,
                timeout: limit,
                passive_mode: options.passive_mode(),
                trust_pasv_address: options.trust_pasv_address(),
                data_tls,
            },
            greeting,
        ))
    }

    pub fn is_secure(&self) -> bool {
        self.data_tls.is_some()
    }

    pub async fn read_reply(&mut self) -> Result<Reply, ProtocolError> {
        receive(&mut self.stream, self.timeout).await
    }

    /// Sends `command` and returns whatever the server replied.
    pub async fn send(&mut self, command: &Command) -> Result<Reply, ProtocolError> {
        exchange(&mut self.stream, self.timeout, command).await
    }

    /// Like [`send`](Self::send), but negative replies become errors.
    pub async fn execute(&mut self, command: &Command) -> Result<Reply, ProtocolError> {
        let reply = self.send(command).await?;
        if reply.code().is_negative() {
            Err(ProtocolError::Rejected(reply))
        } else {
            Ok(reply)
        }
    }

    /// Switches data connections to TLS as well (RFC 4217 `PBSZ 0`, `PROT P`).
    /// Servers expect this after login.
    pub async fn protect_data_connections(&mut self) -> Result<(), ProtocolError> {
        if self.is_secure() {
            self.execute(&Command::ProtectionBufferSize).await?;
            self.execute(&Command::ProtectPrivate).await?;
        }
        Ok(())
    }

    /// Runs a command whose result arrives on a data connection (`NLST`,
    /// `RETR`) and copies everything received into `sink`.
    ///
    /// The final reply is always read, even when copying fails, so the control
    /// connection stays usable for the next command.
    pub async fn transfer_into<W>(
        &mut self,
        command: &Command,
        sink: &mut W,
    ) -> Result<u64, ProtocolError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let data = self.passive_connect().await?;
        let reply = self.send(command).await?;
        if !reply.code().is_preliminary() {
            return Err(ProtocolError::from_reply(reply));
        }
        trace!("{reply}");

        let copied = match self.protect(data).await {
            Ok(mut data) => copy_within(&mut data, sink, self.timeout).await,
            Err(e) => Err(e),
        };
        let done = self.read_reply().await;
        match (copied, done) {
            (Ok(total), Ok(reply)) if reply.code().is_completion() => Ok(total),
            (Ok(_), Ok(reply)) => Err(ProtocolError::from_reply(reply)),
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
        }
    }

    async fn passive_connect(&mut self) -> Result<TcpStream, ProtocolError> {
        let address = match self.passive_mode {
            PassiveMode::Pasv => {
                let reply = self.execute(&Command::Passive).await?;
                if reply.code() != ReplyCode::PASSIVE_MODE {
                    return Err(ProtocolError::UnexpectedReply(reply));
                }
                let (_, advertised) = passive_address(reply.first_line())
                    .finish()
                    .map_err(|_| ProtocolError::MalformedReply(reply.to_string()))?;
                if self.trust_pasv_address {
                    SocketAddr::V4(advertised)
                } else {
                    SocketAddr::new(self.peer.ip(), advertised.port())
                }
            }
            PassiveMode::Epsv => {
                let reply = self.execute(&Command::ExtendedPassive).await?;
                if reply.code() != ReplyCode::EXTENDED_PASSIVE_MODE {
                    return Err(ProtocolError::UnexpectedReply(reply));
                }
                let (_, port) = extended_passive_port(reply.first_line())
                    .finish()
                    .map_err(|_| ProtocolError::MalformedReply(reply.to_string()))?;
                SocketAddr::new(self.peer.ip(), port)
            }
        };
        debug!("opening data connection to {address}");
        within(self.timeout, "opening data connection", TcpStream::connect(address)).await
    }

    async fn protect(&self, data: TcpStream) -> Result<MaybeTlsStream, ProtocolError> {
        let data = MaybeTlsStream::Plain(data);
        match &self.data_tls {
            Some(connector) => {
                within(
                    self.timeout,
                    "tls handshake on data connection",
                    data.upgrade(connector, &self.host),
                )
                .await
            }
            None => Ok(data),
        }
    }
}
