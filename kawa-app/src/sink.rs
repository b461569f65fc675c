//! Delivery over stdout: one JSON object per line.
//!
//! ```text
//! {"event": "recommendations", "data": {...}}
//! {"event": "notifications", "data": [{"code": "game_connected"}]}
//! {"event": "action", "data": {...}, "snapshot": {...}}
//! ```

use std::io::Write;
use std::time::Duration;

use kawa_bot::reactor::Sink;
use kawa_bot::recommend::RecommendationPayload;
use kawa_bot::tracker::TrackerSnapshot;
use kawa_bot::Response;
use serde_json::{json, Value};

pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: Value) {
        let written = serde_json::to_writer(&mut self.out, &line)
            .map_err(std::io::Error::from)
            .and_then(|()| self.out.write_all(b"\n"))
            .and_then(|()| self.out.flush());
        if let Err(e) = written {
            log::error!("failed to write payload: {e}");
        }
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn recommendation(&mut self, payload: &RecommendationPayload) {
        self.emit(json!({"event": "recommendations", "data": payload}));
    }

    fn notifications(&mut self, codes: &[String]) {
        let data: Vec<Value> = codes.iter().map(|code| json!({"code": code})).collect();
        self.emit(json!({"event": "notifications", "data": data}));
    }

    /// No executor is attached; the action is published and no retry is armed.
    fn execute(&mut self, action: &Response, snapshot: &TrackerSnapshot) -> Option<Duration> {
        self.emit(json!({"event": "action", "data": action, "snapshot": snapshot}));
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_are_one_line_each() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.notifications(&["game_connected".to_owned(), "model_loaded_local".to_owned()]);
        sink.notifications(&["return_lobby".to_owned()]);
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "notifications");
        assert_eq!(lines[0]["data"][1]["code"], "model_loaded_local");
    }

    #[test]
    fn actions_carry_the_snapshot() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let retry = sink.execute(&Response::none(), &TrackerSnapshot::default());
        assert!(retry.is_none());
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let line: Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(line["data"]["type"], "none");
        assert_eq!(line["snapshot"]["player_id"], 0);
    }
}
