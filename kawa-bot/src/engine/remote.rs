//! Remote decision engine: gzip JSON over HTTP.
//!
//! `POST {server}/react_batch` (or `/react_batch_3p`) with body
//! `gzip({"obs": [N][C][34], "masks": [N][A]})` and an `Authorization`
//! header carrying the API key. The answer is an [`InferenceResult`].

use std::io::Write;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;

use super::{sync_result, Engine, EngineError, EngineKind, InferenceResult};
use crate::action::Variant;
use crate::encoder::NUM_TILES;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
pub const READ_TIMEOUT: Duration = Duration::from_secs(4);

pub struct RemoteEngine {
    agent: ureq::Agent,
    url: String,
    api_key: String,
    sync: bool,
}

impl RemoteEngine {
    pub fn new(server: &str, api_key: &str, variant: Variant) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(READ_TIMEOUT)
            .build();
        Self {
            agent,
            url: endpoint(server, variant),
            api_key: api_key.to_owned(),
            sync: false,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

pub fn endpoint(server: &str, variant: Variant) -> String {
    let path = if variant.is_3p() { "react_batch_3p" } else { "react_batch" };
    format!("{}/{path}", server.trim_end_matches('/'))
}

/// Gzipped request body with observations reshaped to `[N][C][34]`.
pub fn encode_body(obs: &[Vec<f32>], masks: &[Vec<bool>]) -> Result<Vec<u8>, EngineError> {
    let planes: Vec<Vec<&[f32]>> = obs.iter().map(|o| o.chunks(NUM_TILES).collect()).collect();
    let body = json!({ "obs": planes, "masks": masks });
    let raw = serde_json::to_vec(&body).map_err(|e| EngineError::Malformed(e.to_string()))?;
    let mut gz = GzEncoder::new(Vec::with_capacity(raw.len() / 4), Compression::default());
    gz.write_all(&raw)
        .and_then(|()| gz.finish())
        .map_err(|e| EngineError::Transport(format!("gzip: {e}")))
}

fn error_from_ureq(err: ureq::Error) -> EngineError {
    match err {
        ureq::Error::Status(status, _) => EngineError::Status(status),
        ureq::Error::Transport(transport) => EngineError::Transport(transport.to_string()),
    }
}

impl Engine for RemoteEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Online
    }

    fn react_batch(
        &mut self,
        obs: &[Vec<f32>],
        masks: &[Vec<bool>],
    ) -> Result<InferenceResult, EngineError> {
        if self.sync {
            return Ok(sync_result(masks));
        }
        let body = encode_body(obs, masks)?;
        log::debug!("POST {} ({} items, {} bytes)", self.url, masks.len(), body.len());
        let response = self
            .agent
            .post(&self.url)
            .set("Authorization", &self.api_key)
            .set("Content-Type", "application/json")
            .set("Content-Encoding", "gzip")
            .send_bytes(&body)
            .map_err(error_from_ureq)?;
        let result: InferenceResult = serde_json::from_reader(response.into_reader())
            .map_err(|e| EngineError::Malformed(e.to_string()))?;
        result.validate(masks)?;
        Ok(result)
    }

    fn set_sync_mode(&mut self, on: bool) {
        self.sync = on;
    }
}
