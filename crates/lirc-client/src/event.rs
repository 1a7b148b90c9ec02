//! Events delivered to the session's sink.

use serde::Serialize;
use tokio::sync::mpsc;

/// Event emitted by the event loop bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ClientEvent {
    /// A code line exactly as received from the daemon
    #[serde(rename = "rawdata")]
    RawData { code: String },
    /// One translation of the last raw code
    Data { button: String, source: String },
    /// The daemon connection dropped
    Closed,
}

impl ClientEvent {
    /// Event name: `rawdata`, `data` or `closed`
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::RawData { .. } => "rawdata",
            ClientEvent::Data { .. } => "data",
            ClientEvent::Closed => "closed",
        }
    }
}

/// Receiver of [`ClientEvent`]s. Called synchronously from the bridge, in
/// dispatch order.
pub trait EventSink: Send {
    fn emit(&mut self, event: ClientEvent);
}

impl<F> EventSink for F
where
    F: FnMut(ClientEvent) + Send,
{
    fn emit(&mut self, event: ClientEvent) {
        self(event);
    }
}

impl EventSink for mpsc::UnboundedSender<ClientEvent> {
    fn emit(&mut self, event: ClientEvent) {
        if self.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }
}
