use tracing::debug;

use super::Entry;
use crate::code::DecodedCode;

#[derive(Debug, Clone)]
struct EntryState {
    def: Entry,
    next_code: usize,
    next_config: usize,
    /// Set once a `once` entry has switched mode; cleared when that mode is left
    fired: bool,
}

impl EntryState {
    fn new(def: Entry) -> Self {
        Self {
            def,
            next_code: 0,
            next_config: 0,
            fired: false,
        }
    }

    fn fires_on(&self, repeat: u32) -> bool {
        let Entry {
            repeat: every,
            delay,
            ..
        } = self.def;
        repeat == 0 || (every > 0 && repeat > delay && (repeat - delay - 1) % every == 0)
    }

    /// 0: no match, 1: matched without firing, 2: fire the entry.
    fn match_level(&mut self, code: &DecodedCode) -> u8 {
        let fires = self.fires_on(code.repeat);
        let len = self.def.codes.len();
        if len == 0 {
            return u8::from(fires);
        }

        if self.def.codes[self.next_code].matches(&code.remote, &code.button) {
            let mut level = 0;
            if len == 1 || code.repeat == 0 {
                self.next_code += 1;
                if len > 1 {
                    level = 1;
                }
            }
            if self.next_code == len {
                self.next_code = 0;
                if len > 1 || fires {
                    level = 2;
                }
            }
            return level;
        }

        if code.repeat != 0 {
            return 0;
        }
        if self.def.flags.toggle_reset {
            self.next_config = 0;
        }
        if self.next_code != 0 {
            self.next_code = usize::from(self.def.codes[0].matches(&code.remote, &code.button));
        }
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Fresh,
    At(usize),
    /// A `quit` entry ended the scan for the current code
    Exhausted,
}

/// A loaded lircrc with its translation state.
///
/// Translating a code is an iterator protocol: call
/// [`next_translation`](Self::next_translation) until it returns `None`.
/// Each call resumes scanning after the entry that produced the previous
/// result.
#[derive(Debug, Clone)]
pub struct MappingTable {
    entries: Vec<EntryState>,
    current_mode: Option<String>,
    cursor: Cursor,
}

impl MappingTable {
    /// Build a table, selecting the startup mode: the `mode` of the first
    /// `startup_mode` entry, else a mode block named after `program`.
    #[must_use]
    pub fn from_entries(entries: Vec<Entry>, program: Option<&str>) -> Self {
        let startup = entries
            .iter()
            .filter(|e| program.is_none_or(|p| e.prog == p))
            .find(|e| e.flags.startup_mode && e.change_mode.is_some())
            .and_then(|e| e.change_mode.clone())
            .or_else(|| {
                let program = program?;
                entries
                    .iter()
                    .any(|e| e.mode.as_deref().is_some_and(|m| m.eq_ignore_ascii_case(program)))
                    .then(|| program.to_string())
            });

        Self {
            entries: entries.into_iter().map(EntryState::new).collect(),
            current_mode: startup,
            cursor: Cursor::Fresh,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn mode(&self) -> Option<&str> {
        self.current_mode.as_deref()
    }

    pub fn set_mode(&mut self, mode: Option<String>) {
        debug!("lircrc mode {:?} -> {:?}", self.current_mode, mode);
        self.current_mode = mode;
    }

    /// Drop any half-finished scan so the next call starts a new code.
    pub fn begin_scan(&mut self) {
        self.cursor = Cursor::Fresh;
    }

    /// Next config string for `code`, or `None` once every matching entry
    /// for this code has been visited.
    pub fn next_translation(&mut self, code: &DecodedCode, program: &str) -> Option<String> {
        let start = match self.cursor {
            Cursor::Fresh => 0,
            Cursor::At(index) => index,
            Cursor::Exhausted => {
                self.cursor = Cursor::Fresh;
                return None;
            }
        };

        let mut quit = false;
        let mut found = None;
        for index in start..self.entries.len() {
            // Other programs' entries take no part in the scan at all
            if self.entries[index].def.prog != program {
                continue;
            }
            let level = self.entries[index].match_level(code);
            if level == 0 || quit || !self.mode_matches(index) {
                continue;
            }

            let output = if level > 1 {
                self.execute(index)
            } else {
                None
            };

            if self.entries[index].def.flags.quit {
                quit = true;
                found = output;
            } else if output.is_some() {
                self.cursor = Cursor::At(index + 1);
                return output;
            }
        }

        if found.is_some() {
            self.cursor = Cursor::Exhausted;
        } else {
            self.cursor = Cursor::Fresh;
        }
        found
    }

    fn mode_matches(&self, index: usize) -> bool {
        match (&self.entries[index].def.mode, &self.current_mode) {
            (None, _) => true,
            (Some(required), Some(current)) => required.eq_ignore_ascii_case(current),
            (Some(_), None) => false,
        }
    }

    fn execute(&mut self, index: usize) -> Option<String> {
        let mut run = true;

        if self.entries[index].def.flags.mode {
            self.leave_mode();
        }

        if let Some(mode) = self.entries[index].def.change_mode.clone() {
            self.set_mode(Some(mode));
            let entry = &mut self.entries[index];
            if entry.def.flags.once {
                run = !entry.fired;
                entry.fired = true;
            }
        }

        let entry = &mut self.entries[index];
        if !run || entry.def.configs.is_empty() {
            return None;
        }

        let config = entry.def.configs[entry.next_config].clone();
        entry.next_config = (entry.next_config + 1) % entry.def.configs.len();
        Some(config)
    }

    fn leave_mode(&mut self) {
        let Some(left) = self.current_mode.take() else {
            return;
        };
        debug!("Leaving lircrc mode {}", left);
        for entry in &mut self.entries {
            if entry
                .def
                .change_mode
                .as_deref()
                .is_some_and(|m| m.eq_ignore_ascii_case(&left))
            {
                entry.fired = false;
            }
        }
    }
}
