//! The user-visible error envelope.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// Error envelope written to clients as `{"message", "desc"?, "issue"?}`.
///
/// When `http_code` is unset the output writer picks a default status from
/// the request method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fault {
    pub http_code: Option<u16>,
    pub message: String,
    pub desc: Option<String>,
    pub issue: Option<String>,
}

impl Fault {
    /// Wrap an underlying error with a user-facing message.
    pub fn new(issue: impl fmt::Display, message: impl Into<String>) -> Fault {
        Fault {
            http_code: None,
            message: message.into(),
            desc: None,
            issue: Some(issue.to_string()),
        }
    }

    /// A fault carrying only a message.
    pub fn with_message(message: impl Into<String>) -> Fault {
        Fault {
            message: message.into(),
            ..Fault::default()
        }
    }

    /// Set an explicit HTTP status code.
    pub fn status(mut self, code: u16) -> Fault {
        self.http_code = Some(code);
        self
    }

    /// Attach a longer description.
    pub fn desc(mut self, desc: impl Into<String>) -> Fault {
        self.desc = Some(desc.into());
        self
    }
}

impl Serialize for Fault {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("message", &self.message)?;
        if let Some(desc) = &self.desc {
            map.serialize_entry("desc", desc)?;
        }
        if let Some(issue) = &self.issue {
            map.serialize_entry("issue", issue)?;
        }
        map.end()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.issue {
            Some(issue) => write!(f, "{issue}"),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Fault {}
