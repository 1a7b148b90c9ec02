//! Raw codes as delivered by lircd.

use std::fmt;

/// One code line received from the daemon, kept verbatim.
///
/// The session never interprets a raw code itself; it forwards it to the
/// sink and to the mapping tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawCode(String);

impl RawCode {
    #[must_use]
    pub fn new(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Split the line into its `<code> <repeat> <button> <remote>` fields.
    ///
    /// # Errors
    ///
    /// Returns a [`MalformedCode`] if a field is missing or a number does
    /// not parse as hexadecimal.
    pub fn decode(&self) -> Result<DecodedCode, MalformedCode> {
        let malformed = || MalformedCode(self.0.clone());
        let mut fields = self.0.split_whitespace();

        let code = fields
            .next()
            .and_then(|f| u64::from_str_radix(f, 16).ok())
            .ok_or_else(malformed)?;
        let repeat = fields
            .next()
            .and_then(|f| u32::from_str_radix(f, 16).ok())
            .ok_or_else(malformed)?;
        let button = fields.next().ok_or_else(malformed)?.to_string();
        let remote = fields.next().ok_or_else(malformed)?.to_string();

        Ok(DecodedCode {
            code,
            repeat,
            button,
            remote,
        })
    }
}

impl fmt::Display for RawCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RawCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RawCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Fields of a code line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCode {
    pub code: u64,
    /// 0 for the initial press, incremented for every repeat
    pub repeat: u32,
    pub button: String,
    pub remote: String,
}

/// A code line that does not have the four expected fields
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed code line: '{0}'")]
pub struct MalformedCode(pub String);
