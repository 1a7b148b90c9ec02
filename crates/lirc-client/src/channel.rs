//! Daemon channel: the socket connection to lircd.
//!
//! [`Connector`] and [`DaemonChannel`] are the seam between the session and
//! the daemon. [`LircdConnector`] opens a real Unix socket; tests plug in
//! scripted implementations.

use std::future::Future;
use std::io;
use std::path::PathBuf;

use bytes::BytesMut;
use tokio::net::UnixStream;
use tokio_util::codec::Decoder;
use tracing::{debug, info, warn};

use crate::code::RawCode;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::transport::{LircdCodec, Packet, Reply};

const READ_CHUNK: usize = 256;

/// Get the lircd socket path (`$LIRC_SOCKET_PATH` or `/var/run/lirc/lircd`).
#[must_use]
pub fn socket_path() -> PathBuf {
    ClientConfig::from_env().socket_path
}

/// Result of reading one code record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Code(RawCode),
    /// Nothing complete to deliver yet
    NoInput,
    /// The daemon is gone; the reason is for logging
    Lost(String),
}

/// An open connection to the daemon.
pub trait DaemonChannel: Send + Sync {
    /// Resolve when a read is worth attempting.
    fn readable(&self) -> impl Future<Output = io::Result<()>> + Send;

    /// Read at most once from the daemon and return the next code record.
    fn read_code(&mut self) -> ReadOutcome;

    /// Release the connection. Further reads report [`ReadOutcome::Lost`].
    fn close(&mut self);
}

/// Opens [`DaemonChannel`]s.
pub trait Connector: Send + Sync {
    type Channel: DaemonChannel;

    /// Open a channel identifying as `program`.
    fn open(
        &self,
        program: &str,
        verbose: bool,
    ) -> impl Future<Output = Result<Self::Channel>> + Send;
}

/// Connects to lircd over its Unix socket
#[derive(Debug, Clone, Default)]
pub struct LircdConnector {
    config: ClientConfig,
}

impl LircdConnector {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Connector for LircdConnector {
    type Channel = LircdChannel;

    async fn open(&self, program: &str, verbose: bool) -> Result<LircdChannel> {
        let path = &self.config.socket_path;
        let stream = UnixStream::connect(path).await.map_err(|e| {
            Error::connection(format!("cannot connect to lircd at {}: {e}", path.display()))
        })?;
        info!("{}: connected to lircd at {}", program, path.display());

        Ok(LircdChannel {
            stream: Some(stream),
            buffer: BytesMut::with_capacity(READ_CHUNK),
            codec: LircdCodec::new(self.config.max_line_length),
            max_line_length: self.config.max_line_length,
            program: program.to_string(),
            verbose,
        })
    }
}

/// Socket channel to lircd
#[derive(Debug)]
pub struct LircdChannel {
    stream: Option<UnixStream>,
    buffer: BytesMut,
    codec: LircdCodec,
    max_line_length: usize,
    program: String,
    verbose: bool,
}

impl LircdChannel {
    fn decode_buffered(&mut self) -> Option<ReadOutcome> {
        loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(Packet::Code(line))) => {
                    debug!("{}: code '{}'", self.program, line);
                    return Some(ReadOutcome::Code(RawCode::from(line)));
                }
                Ok(Some(Packet::Reply(reply))) => self.report_reply(&reply),
                Ok(None) => return None,
                Err(e) if !e.is_fatal() => self.report(&e.to_string()),
                Err(e) => return Some(ReadOutcome::Lost(e.to_string())),
            }
        }
    }

    fn report_reply(&self, reply: &Reply) {
        if reply.command == "SIGHUP" {
            self.report("lircd reloaded its configuration");
        } else {
            self.report(&format!(
                "ignoring reply to {} (success: {:?})",
                reply.command, reply.success
            ));
        }
    }

    fn report(&self, message: &str) {
        if self.verbose {
            warn!("{}: {}", self.program, message);
        } else {
            debug!("{}: {}", self.program, message);
        }
    }
}

impl DaemonChannel for LircdChannel {
    async fn readable(&self) -> io::Result<()> {
        if self.buffer.contains(&b'\n') {
            return Ok(());
        }
        match &self.stream {
            Some(stream) => stream.readable().await,
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "channel closed",
            )),
        }
    }

    fn read_code(&mut self) -> ReadOutcome {
        if let Some(outcome) = self.decode_buffered() {
            return outcome;
        }

        let Some(stream) = &self.stream else {
            return ReadOutcome::Lost("channel closed".to_string());
        };

        self.buffer.reserve(READ_CHUNK);
        match stream.try_read_buf(&mut self.buffer) {
            Ok(0) => ReadOutcome::Lost("lircd closed the connection".to_string()),
            Ok(_) => self.decode_buffered().unwrap_or(ReadOutcome::NoInput),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => ReadOutcome::NoInput,
            Err(e) => ReadOutcome::Lost(e.to_string()),
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("{}: closing lircd socket", self.program);
        }
        self.buffer.clear();
        self.codec = LircdCodec::new(self.max_line_length);
    }
}
