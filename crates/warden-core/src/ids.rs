//! Identifiers for requests and sessions.
//!
//! Both are opaque strings supplied by the agent side. The broker never
//! interprets them beyond equality and display.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Number of characters shown when an id is abbreviated for humans.
pub const SHORT_ID_LEN: usize = 8;

/// Correlation id for one pending approval request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Create a new random request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First [`SHORT_ID_LEN`] characters, for footers and logs.
    #[must_use]
    pub fn short(&self) -> &str {
        prefix_chars(&self.0, SHORT_ID_LEN)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity of one agent session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First [`SHORT_ID_LEN`] characters, used as the fallback thread name.
    #[must_use]
    pub fn short(&self) -> &str {
        prefix_chars(&self.0, SHORT_ID_LEN)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

fn prefix_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_new_is_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn short_truncates_to_eight_chars() {
        let id = RequestId::from("0123456789abcdef");
        assert_eq!(id.short(), "01234567");

        let session = SessionId::from("abc");
        assert_eq!(session.short(), "abc");
    }

    #[test]
    fn short_respects_char_boundaries() {
        let session = SessionId::from("ééééééééé");
        assert_eq!(session.short(), "éééééééé");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&RequestId::from("r-1")).unwrap();
        assert_eq!(json, "\"r-1\"");
        let parsed: SessionId = serde_json::from_str("\"s-1\"").unwrap();
        assert_eq!(parsed.as_str(), "s-1");
    }
}
