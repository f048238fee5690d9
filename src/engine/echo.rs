//! Diagnostic engine that "recognizes" the byte length of its input.

use crate::engine::{Engine, RecognitionSession, StreamingEngine, TranscribeOptions};
use crate::error::EngineError;

/// Reports `len(audio)` as text: once for a whole buffer, or once per chunk
/// when streaming.
#[derive(Debug, Clone)]
pub struct EchoEngine {
    name: String,
}

impl EchoEngine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Engine for EchoEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn transcribe(&self, audio: &[u8], _options: &TranscribeOptions) -> Result<String, EngineError> {
        Ok(audio.len().to_string())
    }
}

impl StreamingEngine for EchoEngine {
    fn open(&self, _options: &TranscribeOptions) -> Result<Box<dyn RecognitionSession>, EngineError> {
        Ok(Box::new(EchoSession))
    }
}

struct EchoSession;

impl RecognitionSession for EchoSession {
    fn accept(&mut self, chunk: &[u8]) -> Result<Option<String>, EngineError> {
        Ok(Some(chunk.len().to_string()))
    }

    fn finish(&mut self) -> Result<Option<String>, EngineError> {
        Ok(None)
    }
}
