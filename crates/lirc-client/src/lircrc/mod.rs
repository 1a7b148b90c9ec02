//! lircrc mapping tables.
//!
//! An lircrc file maps remote buttons to application strings:
//!
//! ```text
//! begin
//!     prog   = mediaplayer
//!     remote = *
//!     button = KEY_PLAY
//!     config = play
//!     config = pause
//! end
//!
//! begin tv
//!     begin
//!         prog   = mediaplayer
//!         button = KEY_1
//!         config = channel 1
//!     end
//! end tv
//! ```
//!
//! [`parser`] turns the text into [`Entry`] definitions; [`MappingTable`]
//! holds the runtime state (active mode, cycling `config` lines, button
//! sequences) needed to translate codes.

mod parser;
mod table;

use std::path::{Path, PathBuf};

use tracing::debug;

pub use parser::{ParseError, parse_file, parse_str};
pub use table::MappingTable;

use crate::config::{ClientConfig, expand_home};
use crate::error::{Error, Result};

/// Remote or button name matching anything
pub const WILDCARD: &str = "*";

/// One `begin` .. `end` block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub prog: String,
    /// Button sequence; empty matches every code
    pub codes: Vec<KeySpec>,
    pub configs: Vec<String>,
    /// Fire on every n-th repeat; 0 ignores repeats
    pub repeat: u32,
    /// Repeats skipped before `repeat` applies
    pub delay: u32,
    /// Mode block the entry lives in
    pub mode: Option<String>,
    /// Mode switched to when the entry fires
    pub change_mode: Option<String>,
    pub flags: EntryFlags,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)] // mirrors the lircrc `flags` keywords
pub struct EntryFlags {
    pub once: bool,
    pub quit: bool,
    pub mode: bool,
    pub startup_mode: bool,
    pub toggle_reset: bool,
}

/// Remote/button pair of a button sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    pub remote: String,
    pub button: String,
}

impl KeySpec {
    #[must_use]
    pub fn new(remote: impl Into<String>, button: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            button: button.into(),
        }
    }

    #[must_use]
    pub fn matches(&self, remote: &str, button: &str) -> bool {
        let field_matches =
            |pattern: &str, value: &str| pattern == WILDCARD || pattern.eq_ignore_ascii_case(value);
        field_matches(&self.remote, remote) && field_matches(&self.button, button)
    }
}

/// Loads lircrc files into [`MappingTable`]s
#[derive(Debug, Clone)]
pub struct LircrcLoader {
    program: Option<String>,
    include_depth: usize,
    defaults: Vec<PathBuf>,
}

impl LircrcLoader {
    #[must_use]
    pub fn new(config: &ClientConfig, program: Option<&str>) -> Self {
        Self {
            program: program.map(str::to_string),
            include_depth: config.include_depth,
            defaults: config.default_lircrc_candidates(),
        }
    }

    /// Resolve a source path. The empty string selects the first existing
    /// default lircrc.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigLoad` if the path is empty and no default file
    /// exists.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        if !path.is_empty() {
            return Ok(expand_home(path));
        }

        self.defaults
            .iter()
            .find(|candidate| candidate.is_file())
            .cloned()
            .ok_or_else(|| Error::config_load("", "no default lircrc file found"))
    }

    /// Load the table for `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigLoad` if the file cannot be read or parsed.
    pub fn load(&self, path: &str) -> Result<MappingTable> {
        let resolved = self.resolve(path)?;
        self.load_file(&resolved)
    }

    fn load_file(&self, path: &Path) -> Result<MappingTable> {
        let entries = parse_file(path, self.include_depth)?;
        debug!(
            "Loaded {} lircrc entries from {}",
            entries.len(),
            path.display()
        );
        Ok(MappingTable::from_entries(entries, self.program.as_deref()))
    }
}
