//! Frames exchanged with a transport.
//!
//! A [`Frame`] is what a transport hands to `on_connect` and per-topic handlers;
//! a [`CloseFrame`] is what it hands to `on_disconnect`.

use std::collections::BTreeMap;

/// Frame headers (ordered for stable output).
pub type Headers = BTreeMap<String, String>;

/// A broker frame: command, headers and a text body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    /// Frame command, e.g. `CONNECTED` or `MESSAGE`.
    pub command: String,
    /// Frame headers.
    pub headers: Headers,
    /// Raw text body.
    pub body: String,
}

impl Frame {
    /// Creates an empty frame with the given command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Headers::new(),
            body: String::new(),
        }
    }

    /// Creates a `MESSAGE` frame carrying `body`.
    pub fn message(body: impl Into<String>) -> Self {
        Self::new("MESSAGE").with_body(body)
    }

    /// Adds a header.
    #[inline]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Replaces the body.
    #[inline]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns a header value.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

/// Reported when the underlying socket closes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseFrame {
    /// WebSocket close code.
    pub code: u16,
    /// Close reason, possibly empty.
    pub reason: String,
}

impl CloseFrame {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_frame_builder() {
        let f = Frame::message(r#"{"x":1}"#)
            .with_header("destination", "/topic/a")
            .with_header("message-id", "7");

        assert_eq!(f.command, "MESSAGE");
        assert_eq!(f.body, r#"{"x":1}"#);
        assert_eq!(f.header("destination"), Some("/topic/a"));
        assert_eq!(f.header("missing"), None);
        assert_eq!(f.headers.keys().collect::<Vec<_>>(), ["destination", "message-id"]);
    }
}
