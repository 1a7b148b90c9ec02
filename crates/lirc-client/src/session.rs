//! Connection manager: the session state machine.
//!
//! A [`Session`] is either disconnected (the initial state) or connected.
//! `connect` and `reconnect` move it to connected, `close` and a lost
//! daemon move it back. The config registry belongs to the session but
//! does not depend on the connection: configs can be added and cleared in
//! either state.

use tracing::{debug, info};

use crate::bridge::Bridge;
use crate::channel::{Connector, DaemonChannel, LircdConnector};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::event::EventSink;
use crate::lircrc::{LircrcLoader, MappingTable};
use crate::registry::ConfigRegistry;

/// Config paths handed to `connect` or `add_config`.
///
/// The empty string stands for the default lircrc. The default value is a
/// single empty string, i.e. one default-table load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSources(Vec<String>);

impl ConfigSources {
    #[must_use]
    pub fn none() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self(vec![String::new()])
    }
}

impl From<&str> for ConfigSources {
    fn from(path: &str) -> Self {
        Self(vec![path.to_string()])
    }
}

impl From<String> for ConfigSources {
    fn from(path: String) -> Self {
        Self(vec![path])
    }
}

impl From<Vec<String>> for ConfigSources {
    fn from(paths: Vec<String>) -> Self {
        Self(paths)
    }
}

impl From<Vec<&str>> for ConfigSources {
    fn from(paths: Vec<&str>) -> Self {
        Self(paths.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for ConfigSources {
    fn from(paths: &[&str]) -> Self {
        Self(paths.iter().map(|p| (*p).to_string()).collect())
    }
}

impl From<&[String]> for ConfigSources {
    fn from(paths: &[String]) -> Self {
        Self(paths.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for ConfigSources {
    fn from(paths: [&str; N]) -> Self {
        Self(paths.iter().map(|p| (*p).to_string()).collect())
    }
}

/// A client session with lircd.
///
/// Owns the daemon channel, the config registry and the event sink. Events
/// are only produced while the session is driven, see
/// [`Session::next_cycle`] and [`Session::run`].
pub struct Session<C: Connector = LircdConnector> {
    pub(crate) connector: C,
    pub(crate) config: ClientConfig,
    pub(crate) connected: bool,
    pub(crate) program: String,
    pub(crate) verbose: bool,
    pub(crate) channel: Option<C::Channel>,
    pub(crate) registry: ConfigRegistry,
    pub(crate) sink: Option<Box<dyn EventSink>>,
    pub(crate) bridge: Bridge,
}

impl Session<LircdConnector> {
    /// Session talking to the lircd socket named in `config`.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(LircdConnector::new(config.clone()), config)
    }
}

impl Default for Session<LircdConnector> {
    fn default() -> Self {
        Self::new(ClientConfig::from_env())
    }
}

impl<C: Connector> Session<C> {
    #[must_use]
    pub fn with_connector(connector: C, config: ClientConfig) -> Self {
        Self {
            connector,
            config,
            connected: false,
            program: String::new(),
            verbose: false,
            channel: None,
            registry: ConfigRegistry::new(),
            sink: None,
            bridge: Bridge::default(),
        }
    }

    /// Open the daemon channel as `program`, load `sources` into a fresh
    /// registry and start delivering events to `sink`.
    ///
    /// Does nothing if the session is already connected. Program, verbose
    /// flag and sink are remembered for [`Session::reconnect`] even when the
    /// call fails.
    ///
    /// # Errors
    ///
    /// - `Error::Argument` if `program` is empty
    /// - `Error::Connection` if the daemon cannot be reached; the session
    ///   stays disconnected
    /// - `Error::ConfigLoad` or `Error::RegistryFull` if a config fails to
    ///   load; the channel stays open but the session is not connected, so
    ///   the caller must retry or close
    pub async fn connect(
        &mut self,
        program: &str,
        verbose: bool,
        sources: impl Into<ConfigSources>,
        sink: impl EventSink + 'static,
    ) -> Result<()> {
        if self.connected {
            debug!("connect: already connected as {}", self.program);
            return Ok(());
        }
        if program.is_empty() {
            return Err(Error::Argument("program name must not be empty".to_string()));
        }

        let sources = sources.into();
        self.program = program.to_string();
        self.verbose = verbose;
        self.sink = Some(Box::new(sink));
        self.establish(sources.as_slice()).await
    }

    /// Replay the last `connect` with the remembered program, verbose flag,
    /// sink and the current config file list.
    ///
    /// Does nothing if the session is already connected.
    ///
    /// # Errors
    ///
    /// Returns `Error::Argument` if `connect` was never called, otherwise
    /// the same errors as [`Session::connect`].
    pub async fn reconnect(&mut self) -> Result<()> {
        if self.connected {
            return Ok(());
        }
        if self.program.is_empty() || self.sink.is_none() {
            return Err(Error::Argument(
                "reconnect called before connect".to_string(),
            ));
        }

        let files = self.registry.files().to_vec();
        info!("{}: reconnecting with {} config(s)", self.program, files.len());
        self.establish(&files).await
    }

    async fn establish(&mut self, sources: &[String]) -> Result<()> {
        if self.channel.is_none() {
            let channel = self.connector.open(&self.program, self.verbose).await?;
            self.channel = Some(channel);
        }

        self.registry.clear();
        let loader = self.loader();
        self.registry.add(sources, &loader)?;

        self.bridge.arm();
        self.connected = true;
        info!(
            "{}: session connected, {} config(s) loaded",
            self.program,
            self.registry.len()
        );
        Ok(())
    }

    /// Tear the session down, or release the half-open channel of a failed
    /// `connect` when disconnected.
    ///
    /// When connected, frees every table, stops the bridge and closes the
    /// channel. The config file list is kept for `reconnect`. When
    /// disconnected, nothing else changes.
    pub fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        if !self.connected {
            return;
        }

        self.registry.release();
        self.bridge.disarm();
        self.connected = false;
        info!("{}: session closed", self.program);
    }

    /// Load configs into the registry, whether or not the session is
    /// connected.
    ///
    /// # Errors
    ///
    /// Returns `Error::RegistryFull` or `Error::ConfigLoad` for the first
    /// path that fails; paths before it stay loaded.
    pub fn add_config(&mut self, sources: impl Into<ConfigSources>) -> Result<()> {
        let sources = sources.into();
        let loader = self.loader();
        self.registry.add(sources.as_slice(), &loader)
    }

    /// Free every table and forget the config file list.
    pub fn clear_config(&mut self) {
        self.registry.clear();
    }

    /// Free the lowest slot loaded from `path`. Returns the freed index.
    pub fn remove_config(&mut self, path: &str) -> Option<usize> {
        self.registry.remove(path)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Active mode of the table in slot 0, `None` if that slot is empty or
    /// no mode is active
    #[must_use]
    pub fn mode(&self) -> Option<&str> {
        self.registry.first_table().and_then(MappingTable::mode)
    }

    /// Replace the active mode of the table in slot 0. `None` leaves any
    /// mode.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoConfigLoaded` if slot 0 holds no table.
    pub fn set_mode(&mut self, mode: Option<&str>) -> Result<()> {
        let table = self
            .registry
            .first_table_mut()
            .ok_or(Error::NoConfigLoaded)?;
        table.set_mode(mode.map(str::to_string));
        debug!("mode set to {:?}", mode);
        Ok(())
    }

    /// Config paths in load order
    #[must_use]
    pub fn config_files(&self) -> &[String] {
        self.registry.files()
    }

    #[must_use]
    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Loader for this session's program name
    #[must_use]
    pub fn loader(&self) -> LircrcLoader {
        let program = (!self.program.is_empty()).then_some(self.program.as_str());
        LircrcLoader::new(&self.config, program)
    }
}
