//! STOMP text frames (Amatsuki).
//!
//! `COMMAND\nkey:value\n...\n\nbody\0`. Only the handful of headers the
//! bridge routes on are kept; the body is expected to be JSON.

use std::collections::HashMap;

use serde_json::Value;

use crate::errors::{KawaError, KawaResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StompCommand {
    Connect,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Message,
}

impl StompCommand {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "CONNECT" => StompCommand::Connect,
            "CONNECTED" => StompCommand::Connected,
            "SEND" => StompCommand::Send,
            "SUBSCRIBE" => StompCommand::Subscribe,
            "UNSUBSCRIBE" => StompCommand::Unsubscribe,
            "MESSAGE" => StompCommand::Message,
            _ => return None,
        })
    }

    fn as_str(self) -> &'static str {
        match self {
            StompCommand::Connect => "CONNECT",
            StompCommand::Connected => "CONNECTED",
            StompCommand::Send => "SEND",
            StompCommand::Subscribe => "SUBSCRIBE",
            StompCommand::Unsubscribe => "UNSUBSCRIBE",
            StompCommand::Message => "MESSAGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StompFrame {
    pub command: StompCommand,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl StompFrame {
    pub fn parse(raw: &[u8]) -> KawaResult<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| KawaError::codec(format!("stomp frame is not utf-8: {e}")))?;
        let text = text.strip_suffix('\0').unwrap_or(text);

        let (head, body) = match text.split_once("\n\n") {
            Some((head, body)) => (head, body),
            // Some captures collapse the blank separator; the body is then the last line.
            None => match text.rsplit_once('\n') {
                Some((head, body)) => (head, body),
                None => (text, ""),
            },
        };

        let mut lines = head.lines();
        let command_line = lines.next().unwrap_or_default().trim_end_matches('\r');
        let command = StompCommand::parse(command_line)
            .ok_or_else(|| KawaError::parse(command_line, "unknown stomp command"))?;

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((key, value)) = line.trim_end_matches('\r').split_once(':') {
                headers.insert(key.to_owned(), value.to_owned());
            }
        }

        Ok(Self {
            command,
            headers,
            body: body.trim_end_matches('\0').to_owned(),
        })
    }

    pub fn destination(&self) -> Option<&str> {
        self.headers.get("destination").map(String::as_str)
    }

    /// Body as JSON, None when empty or not JSON.
    pub fn json(&self) -> Option<Value> {
        let body = self.body.trim();
        if body.is_empty() {
            return None;
        }
        match serde_json::from_str(body) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("stomp body is not json: {e}");
                None
            }
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::from(self.command.as_str());
        out.push('\n');
        let mut keys: Vec<_> = self.headers.keys().collect();
        keys.sort();
        for key in keys {
            out.push_str(key);
            out.push(':');
            out.push_str(&self.headers[key]);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out.into_bytes()
    }

    pub fn message(destination: &str, body: &Value) -> Self {
        let body = body.to_string();
        let mut headers = HashMap::new();
        headers.insert("destination".to_owned(), destination.to_owned());
        headers.insert("content-type".to_owned(), "application/json".to_owned());
        headers.insert("content-length".to_owned(), body.len().to_string());
        Self {
            command: StompCommand::Message,
            headers,
            body,
        }
    }
}
