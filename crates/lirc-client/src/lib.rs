//! Client for the lircd infrared daemon.
//!
//! A [`Session`] connects to lircd over its Unix socket, loads lircrc
//! mapping tables into a fixed-size registry and turns every code the daemon
//! sends into events for an [`EventSink`]:
//!
//! - `rawdata`: the code line as received
//! - `data`: one per translation, in registry slot order
//! - `closed`: the daemon went away
//!
//! # Architecture
//!
//! - [`session`]: connection state machine and registry management
//! - [`bridge`]: readability-driven read and dispatch cycles
//! - [`registry`]: the 20 config slots and the config file list
//! - [`translate`]: expanding one code against every loaded table
//! - [`lircrc`]: lircrc parsing and per-table translation state
//! - [`channel`]: the daemon socket behind the [`Connector`] seam
//! - [`transport`]: line codec for the lircd byte stream
//! - [`config`]: client configuration
//!
//! # Example
//!
//! ```no_run
//! use lirc_client::{ClientConfig, ClientEvent, Session};
//!
//! # async fn example() -> lirc_client::Result<()> {
//! let mut session = Session::new(ClientConfig::from_env());
//! session
//!     .connect("mythtv", false, "~/.lircrc", |event: ClientEvent| {
//!         println!("{event:?}");
//!     })
//!     .await?;
//!
//! session.run().await;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod channel;
pub mod code;
pub mod config;
pub mod error;
pub mod event;
pub mod lircrc;
pub mod registry;
pub mod session;
pub mod translate;
pub mod transport;

pub use bridge::Cycle;
pub use channel::{Connector, DaemonChannel, LircdChannel, LircdConnector, ReadOutcome, socket_path};
pub use code::{DecodedCode, MalformedCode, RawCode};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use event::{ClientEvent, EventSink};
pub use lircrc::{LircrcLoader, MappingTable};
pub use registry::{ConfigRegistry, MAX_CONFIGS};
pub use session::{ConfigSources, Session};
pub use translate::{SymbolicEvent, TranslationWarning, Translations};

#[cfg(test)]
mod tests;
