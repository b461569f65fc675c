//! Error types for the kawa workspace.

use std::fmt;

#[derive(Debug)]
pub enum KawaError {
    /// Tile code or tag text that could not be parsed.
    Parse { input: String, message: String },
    /// Malformed frame at the byte level (header, varint, wire type).
    Codec { message: String },
    /// Tracked state disagrees with an incoming delta.
    InvalidState { message: String },
    /// Decision engine could not be constructed or queried.
    Engine { message: String },
    /// Missing or unusable configuration (schema file, model path).
    Config { message: String },
    /// JSON or schema (de)serialization failure.
    Serialization { message: String },
}

impl KawaError {
    pub fn parse(input: impl Into<String>, message: impl Into<String>) -> Self {
        KawaError::Parse {
            input: input.into(),
            message: message.into(),
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        KawaError::Codec {
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        KawaError::InvalidState {
            message: message.into(),
        }
    }

    pub fn engine(message: impl Into<String>) -> Self {
        KawaError::Engine {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        KawaError::Config {
            message: message.into(),
        }
    }
}

impl fmt::Display for KawaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KawaError::Parse { input, message } => {
                write!(f, "Parse error on '{}': {}", input, message)
            }
            KawaError::Codec { message } => {
                write!(f, "Codec error: {}", message)
            }
            KawaError::InvalidState { message } => {
                write!(f, "Invalid state: {}", message)
            }
            KawaError::Engine { message } => {
                write!(f, "Engine error: {}", message)
            }
            KawaError::Config { message } => {
                write!(f, "Config error: {}", message)
            }
            KawaError::Serialization { message } => {
                write!(f, "Serialization error: {}", message)
            }
        }
    }
}

impl std::error::Error for KawaError {}

impl From<serde_json::Error> for KawaError {
    fn from(err: serde_json::Error) -> Self {
        KawaError::Serialization {
            message: err.to_string(),
        }
    }
}

pub type KawaResult<T> = Result<T, KawaError>;
