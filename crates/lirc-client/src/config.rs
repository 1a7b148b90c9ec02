//! Client configuration.
//!
//! Everything has a default, so an empty JSON object (or no file at all) is
//! a valid configuration:
//!
//! ```json
//! {
//!   "socketPath": "/var/run/lirc/lircd",
//!   "maxLineLength": 1024,
//!   "includeDepth": 10,
//!   "lircrcPaths": []
//! }
//! ```

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::Deserialize;

use crate::Result;
use crate::transport::DEFAULT_MAX_LINE_LENGTH;

/// Environment variable overriding the lircd socket path
pub const SOCKET_PATH_ENV: &str = "LIRC_SOCKET_PATH";

/// Environment variable naming the default lircrc
pub const LIRCRC_ENV: &str = "LIRCRC";

const DEFAULT_SOCKET_PATH: &str = "/var/run/lirc/lircd";
const SYSTEM_LIRCRC: &str = "/etc/lirc/lircrc";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,

    #[serde(default = "default_include_depth")]
    pub include_depth: usize,

    /// Candidates for the empty config path, in order; empty means the
    /// built-in search list
    #[serde(default)]
    pub lircrc_paths: Vec<PathBuf>,
}

fn default_socket_path() -> PathBuf {
    std::env::var_os(SOCKET_PATH_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH), PathBuf::from)
}

fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

fn default_include_depth() -> usize {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            max_line_length: default_max_line_length(),
            include_depth: default_include_depth(),
            lircrc_paths: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Defaults, honoring `LIRC_SOCKET_PATH`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Load a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Json` if it
    /// is not valid configuration JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    #[must_use]
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Default lircrc search list: `$LIRCRC`, `<config dir>/lircrc`,
    /// `~/.lircrc`, then the system file.
    #[must_use]
    pub fn default_lircrc_candidates(&self) -> Vec<PathBuf> {
        if !self.lircrc_paths.is_empty() {
            return self.lircrc_paths.clone();
        }

        let mut candidates = Vec::new();
        if let Some(path) = std::env::var_os(LIRCRC_ENV) {
            candidates.push(PathBuf::from(path));
        }
        if let Some(dirs) = BaseDirs::new() {
            candidates.push(dirs.config_dir().join("lircrc"));
            candidates.push(dirs.home_dir().join(".lircrc"));
        }
        candidates.push(PathBuf::from(SYSTEM_LIRCRC));
        candidates
    }
}

/// Expand a leading `~/` to the home directory.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(dirs) = BaseDirs::new()
    {
        return dirs.home_dir().join(rest);
    }
    PathBuf::from(path)
}
