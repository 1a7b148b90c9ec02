//! Event loop bridge: turns channel readability into sink events.
//!
//! Each readability notification runs exactly one cycle: read one code
//! record, emit `rawdata`, then one `data` event per translation in slot
//! order. A lost daemon closes the session and emits `closed`, after which
//! no cycle runs until the session is connected again.

use tracing::{debug, warn};

use crate::channel::{Connector, DaemonChannel, ReadOutcome};
use crate::code::RawCode;
use crate::event::ClientEvent;
use crate::session::Session;

/// Whether the session is listening for codes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bridge {
    armed: bool,
}

impl Bridge {
    pub(crate) fn arm(&mut self) {
        self.armed = true;
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }

    pub(crate) fn is_armed(self) -> bool {
        self.armed
    }
}

/// Outcome of one bridge cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    /// Woken up but no complete code was available
    Idle,
    /// A code was dispatched, followed by `data` translations
    Dispatched { data: usize },
    /// The daemon went away; the session is now closed
    Closed,
}

impl<C: Connector> Session<C> {
    /// Run one read-and-dispatch cycle without waiting for readability.
    ///
    /// Returns `None` if the session is not armed.
    pub fn run_cycle(&mut self) -> Option<Cycle> {
        if !self.bridge.is_armed() {
            return None;
        }
        let channel = self.channel.as_mut()?;

        let cycle = match channel.read_code() {
            ReadOutcome::Code(raw) => self.dispatch_code(&raw),
            ReadOutcome::NoInput => Cycle::Idle,
            ReadOutcome::Lost(reason) => {
                self.peer_closed(&reason);
                Cycle::Closed
            }
        };
        Some(cycle)
    }

    /// Wait for the channel to become readable, then run one cycle.
    ///
    /// Returns `None` once the session is disarmed, either by `close` or by
    /// a previous cycle that lost the daemon.
    pub async fn next_cycle(&mut self) -> Option<Cycle> {
        if !self.bridge.is_armed() {
            return None;
        }
        let channel = self.channel.as_ref()?;

        if let Err(e) = channel.readable().await {
            self.peer_closed(&e.to_string());
            return Some(Cycle::Closed);
        }
        self.run_cycle()
    }

    /// Drive cycles until the session closes.
    pub async fn run(&mut self) {
        while let Some(cycle) = self.next_cycle().await {
            if cycle == Cycle::Closed {
                break;
            }
        }
    }

    fn dispatch_code(&mut self, raw: &RawCode) -> Cycle {
        self.emit(ClientEvent::RawData {
            code: raw.as_str().to_string(),
        });

        let mut data = 0;
        for event in self.registry.translate(raw, &self.program) {
            debug!(
                "{}: '{}' from slot {}",
                self.program, event.button, event.slot
            );
            if let Some(sink) = self.sink.as_mut() {
                sink.emit(ClientEvent::Data {
                    button: event.button,
                    source: event.source,
                });
            }
            data += 1;
        }
        Cycle::Dispatched { data }
    }

    fn peer_closed(&mut self, reason: &str) {
        warn!("{}: lost connection to lircd: {}", self.program, reason);
        self.close();
        self.emit(ClientEvent::Closed);
    }

    fn emit(&mut self, event: ClientEvent) {
        if let Some(sink) = self.sink.as_mut() {
            sink.emit(event);
        }
    }
}
