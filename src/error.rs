//! Error types for asrcore.

use std::time::Duration;
use thiserror::Error;

/// A stage rejected a buffer it cannot interpret.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProcessingError {
    pub message: String,
}

impl ProcessingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failures raised by recognition engines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine could not initialize or load its model.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The audio handed to the engine cannot be transcribed.
    #[error("invalid audio: {0}")]
    InvalidAudio(String),

    /// The engine exceeded the configured time bound.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

#[derive(Error, Debug)]
pub enum AsrError {
    // Resolution errors
    #[error("Unknown stage: {name}")]
    UnknownStage { name: String },

    #[error("Engine not found: {name}")]
    EngineNotFound { name: String },

    #[error("No engine requested and no default engine configured")]
    NoDefaultEngine,

    #[error("Unknown {section} type '{kind}'")]
    UnknownComponentKind { section: String, kind: String },

    // Session errors
    #[error("Stage '{stage}' failed: {source}")]
    Processing {
        stage: String,
        #[source]
        source: ProcessingError,
    },

    #[error("Engine '{engine}' failed: {source}")]
    Engine {
        engine: String,
        #[source]
        source: EngineError,
    },

    #[error(
        "Streaming session through engine '{engine}' would degrade (batch-only stages: [{}], engine fallback: {engine_fallback})",
        .stages.join(", ")
    )]
    DegradedStreaming {
        engine: String,
        stages: Vec<String>,
        engine_fallback: bool,
    },

    #[error("Chunk source closed by consumer")]
    SourceClosed,

    #[error("Worker thread failed: {message}")]
    Worker { message: String },

    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio file errors
    #[error("Audio format error: {message}")]
    AudioFormat { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AsrError {
    /// Wraps a stage failure with the name of the stage that raised it.
    pub fn processing(stage: impl Into<String>, source: ProcessingError) -> Self {
        Self::Processing {
            stage: stage.into(),
            source,
        }
    }

    /// Wraps an engine failure with the name of the engine that raised it.
    pub fn engine(engine: impl Into<String>, source: EngineError) -> Self {
        Self::Engine {
            engine: engine.into(),
            source,
        }
    }

    /// Returns the engine failure, if this is one.
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            Self::Engine { source, .. } => Some(source),
            _ => None,
        }
    }

    /// True for failures detected while resolving names, before any audio ran.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::UnknownStage { .. }
                | Self::EngineNotFound { .. }
                | Self::NoDefaultEngine
                | Self::DegradedStreaming { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AsrError>;
