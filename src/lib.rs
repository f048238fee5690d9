//! asrcore - pluggable speech recognition pipeline
//!
//! Named preprocessing stages and recognition engines, composed per request
//! and run either over a whole recording or over a chunk stream.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "tokio")]
pub mod bridge;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod service;
pub mod stage;
pub mod stream;

// Composition root for the binary
#[cfg(feature = "cli")]
pub mod app;

// Component interfaces
pub use engine::{
    DeltaStream, Engine, EngineRef, RecognitionSession, StreamingEngine, TranscribeOptions,
    TranscriptDelta,
};
pub use stage::{Capability, Stage, StageRef, StreamProcessor, StreamingStage};

// Composition
pub use pipeline::PipelineChain;
pub use registry::{ComponentCatalog, Registry, RegistryBuilder, SharedRegistry};
pub use service::{SessionPlan, TranscribeRequest, TranscriptionService};
pub use stream::{AudioChunk, ChunkSender, ChunkStream, chunk_channel};

// Error handling
pub use error::{AsrError, EngineError, ProcessingError, Result};

// Config
pub use config::{ComponentConfig, Config, ServiceConfig};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_has_hash_suffix_only_with_git_hash() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
