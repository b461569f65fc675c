//! Runtime settings, read once at startup from a JSON file.
//!
//! Every section falls back to its defaults, so a missing file or a partial
//! file is fine:
//!
//! ```json
//! { "ot": { "online": true, "server": "https://ot.example", "api_key": "..." },
//!   "model_config": { "temperature": 0.3 } }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use kawa_core::Platform;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: LogLevel,
    /// `None` detects the platform from each connection's URL.
    pub platform: Option<Platform>,
    pub ot: OtSettings,
    pub model_config: ModelConfig,
    pub reactor: ReactorSettings,
    pub majsoul: MajsoulSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Remote ("online") engine access.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OtSettings {
    pub online: bool,
    pub server: String,
    pub api_key: String,
}

impl OtSettings {
    pub fn enabled(&self) -> bool {
        self.online && !self.server.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Softmax temperature for recommendation confidence.
    pub temperature: f32,
    pub model_4p: String,
    pub model_3p: String,
    pub model_dir: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            model_4p: "mortal.onnx".to_owned(),
            model_3p: "mortal3p.onnx".to_owned(),
            model_dir: PathBuf::from("models"),
        }
    }
}

impl ModelConfig {
    pub fn model_path(&self, is_3p: bool) -> PathBuf {
        let name = if is_3p { &self.model_3p } else { &self.model_4p };
        self.model_dir.join(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactorSettings {
    pub queue_capacity: usize,
    pub poll_timeout_ms: u64,
    /// Added to an action's estimated duration before a retry fires.
    pub retry_grace_ms: u64,
}

impl Default for ReactorSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            poll_timeout_ms: 100,
            retry_grace_ms: 3000,
        }
    }
}

impl ReactorSettings {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms.max(1))
    }

    pub fn retry_grace(&self) -> Duration {
        Duration::from_millis(self.retry_grace_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MajsoulSettings {
    /// Overrides the bundled liqi schema.
    pub schema_path: Option<PathBuf>,
}

impl Settings {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid settings in {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(text)?;
        anyhow::ensure!(
            settings.model_config.temperature > 0.0,
            "model_config.temperature must be positive, got {}",
            settings.model_config.temperature
        );
        anyhow::ensure!(
            settings.reactor.queue_capacity > 0,
            "reactor.queue_capacity must be positive"
        );
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_all_defaults() {
        let s = Settings::from_json("{}").unwrap();
        assert_eq!(s.log_level, LogLevel::Info);
        assert!(s.platform.is_none());
        assert!(!s.ot.enabled());
        assert!((s.model_config.temperature - 0.3).abs() < 1e-6);
        assert_eq!(s.reactor.queue_capacity, 1000);
        assert_eq!(s.reactor.poll_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let s = Settings::from_json(
            r#"{"log_level": "DEBUG", "platform": "tenhou",
                "ot": {"online": true, "server": "https://ot.example"},
                "model_config": {"model_dir": "/srv/models"}}"#,
        )
        .unwrap();
        assert_eq!(s.log_level.to_filter(), log::LevelFilter::Debug);
        assert_eq!(s.platform, Some(Platform::Tenhou));
        assert!(s.ot.enabled());
        assert!(s.ot.api_key.is_empty());
        assert_eq!(s.model_config.model_path(true), PathBuf::from("/srv/models/mortal3p.onnx"));
        assert_eq!(s.reactor.retry_grace(), Duration::from_secs(3));
    }

    #[test]
    fn rejects_bad_temperature() {
        assert!(Settings::from_json(r#"{"model_config": {"temperature": 0}}"#).is_err());
    }

    #[test]
    fn missing_file_is_default() {
        let s = Settings::load(Path::new("/nonexistent/kawa.json")).unwrap();
        assert_eq!(s.reactor.queue_capacity, 1000);
    }
}
