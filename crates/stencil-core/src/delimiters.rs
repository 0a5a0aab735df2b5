//! Tag delimiter configuration.

use std::fmt;

use serde::Deserialize;

/// The open/close delimiter pair that marks a tag, `{{` and `}}` by default.
///
/// Deserializes from a two-element array such as `["<%", "%>"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "(String, String)")]
pub struct Delimiters {
    open: String,
    close: String,
}

impl Delimiters {
    pub const DEFAULT_OPEN: &'static str = "{{";
    pub const DEFAULT_CLOSE: &'static str = "}}";

    /// Create a delimiter pair.
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// The opening delimiter text.
    pub fn open(&self) -> &str {
        &self.open
    }

    /// The closing delimiter text.
    pub fn close(&self) -> &str {
        &self.close
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new(Self::DEFAULT_OPEN, Self::DEFAULT_CLOSE)
    }
}

impl From<(String, String)> for Delimiters {
    fn from((open, close): (String, String)) -> Self {
        Self { open, close }
    }
}

impl fmt::Display for Delimiters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.open, self.close)
    }
}
