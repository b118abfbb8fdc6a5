use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Frame types on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Request,
    Response,
    Error,
    Event,
}

impl FrameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameKind::Request => "request",
            FrameKind::Response => "response",
            FrameKind::Error => "error",
            FrameKind::Event => "event",
        }
    }
}

impl FromStr for FrameKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "request" => Ok(FrameKind::Request),
            "response" => Ok(FrameKind::Response),
            "error" => Ok(FrameKind::Error),
            "event" => Ok(FrameKind::Event),
            other => Err(Error::Protocol(format!("Invalid message type: `{other}`"))),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the protocol: `<type>\t<name>\t<payload>\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub name: String,
    pub payload: String,
}

impl Frame {
    pub fn new(kind: FrameKind, name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self { kind, name: name.into(), payload: payload.into() }
    }

    pub fn request(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(FrameKind::Request, name, payload)
    }

    pub fn response(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(FrameKind::Response, name, payload)
    }

    pub fn error(name: impl Into<String>, message: impl fmt::Display) -> Self {
        // Keep multi-line messages on one line
        let message = message.to_string().replace(['\n', '\r'], " ");
        Self::new(FrameKind::Error, name, message)
    }

    pub fn event(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(FrameKind::Event, name, payload)
    }

    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.trim_end_matches(['\n', '\r']).splitn(3, '\t');
        let kind = parts
            .next()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Protocol("Expected message type.".into()))?;
        let name = parts
            .next()
            .map(str::trim)
            .ok_or_else(|| Error::Protocol("Expected message name.".into()))?;
        let payload = parts
            .next()
            .map(str::trim)
            .ok_or_else(|| Error::Protocol("Expected message payload.".into()))?;

        Ok(Self::new(kind.parse()?, name, payload))
    }

    /// Serialize as one newline-terminated line.
    pub fn encode(&self) -> Result<String> {
        if self.name.contains(['\t', '\n']) {
            return Err(Error::Protocol("name must not contain tab or newline characters".into()));
        }
        if self.payload.contains('\n') {
            return Err(Error::Protocol("payload must not contain `\\n` characters".into()));
        }
        Ok(format!("{}\t{}\t{}\n", self.kind, self.name, self.payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_request_line() {
        let frame = Frame::parse("request\tping\t\"\"\n").unwrap();
        assert_eq!(frame, Frame::request("ping", "\"\""));
    }

    #[test]
    fn parse_keeps_tabs_inside_payload() {
        let frame = Frame::parse("request\topen-folder\t{\"path\":\"a\tb\"}\r\n").unwrap();
        assert_eq!(frame.name, "open-folder");
        assert_eq!(frame.payload, "{\"path\":\"a\tb\"}");
    }

    #[test]
    fn parse_rejects_missing_parts() {
        let err = Frame::parse("request").unwrap_err();
        assert_eq!(err.to_string(), "Protocol error: Expected message name.");

        let err = Frame::parse("request\tping").unwrap_err();
        assert_eq!(err.to_string(), "Protocol error: Expected message payload.");

        let err = Frame::parse("").unwrap_err();
        assert_eq!(err.to_string(), "Protocol error: Expected message type.");
    }

    #[test]
    fn parse_rejects_unknown_type() {
        let err = Frame::parse("call\tping\t").unwrap_err();
        assert_eq!(err.to_string(), "Protocol error: Invalid message type: `call`");
    }

    #[test]
    fn encode_frames() {
        let line = Frame::response("ping:1", r#"{"success":true,"value":"pong"}"#).encode().unwrap();
        assert_eq!(line, "response\tping:1\t{\"success\":true,\"value\":\"pong\"}\n");
        assert_eq!(Frame::parse(&line).unwrap().name, "ping:1");
    }

    #[test]
    fn encode_rejects_newlines() {
        assert!(Frame::event("progress", "a\nb").encode().is_err());
        assert!(Frame::event("bad\tname", "{}").encode().is_err());
    }

    #[test]
    fn error_frames_are_single_line() {
        let frame = Frame::error("ping", "first\nsecond");
        assert_eq!(frame.payload, "first second");
        assert!(frame.encode().is_ok());
    }
}
