//! Audio preprocessing stages.
//!
//! Every stage transforms a whole buffer. Stages that can also work
//! incrementally implement [`StreamingStage`] and hand out one
//! [`StreamProcessor`] per session, which owns whatever state the stage
//! carries between chunks. The capability is fixed when a stage is wrapped
//! in a [`StageRef`] and never changes afterwards.

pub mod gain;
pub mod normalize;
pub mod smooth;

pub use gain::GainStage;
pub use normalize::NormalizeStage;
pub use smooth::SmoothStage;

use crate::error::{AsrError, ProcessingError, Result};
use crate::stream::{AudioChunk, ChunkStream};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Whether a component can work chunk by chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Batch,
    Streaming,
}

impl Capability {
    pub fn is_streaming(self) -> bool {
        self == Self::Streaming
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch => write!(f, "batch"),
            Self::Streaming => write!(f, "streaming"),
        }
    }
}

/// A named, whole-buffer audio transformation.
///
/// Implementations are shared between concurrent sessions and must not keep
/// per-call state.
pub trait Stage: Send + Sync {
    /// Name the stage is registered under.
    fn name(&self) -> &str;

    /// Transform a complete buffer.
    fn process_batch(&self, audio: &[u8]) -> std::result::Result<Vec<u8>, ProcessingError>;
}

/// A stage that can also process a chunk sequence incrementally.
pub trait StreamingStage: Stage {
    /// Start a new session. Each session gets its own processor.
    fn open(&self) -> Box<dyn StreamProcessor>;
}

/// Per-session state of a streaming stage.
pub trait StreamProcessor: Send {
    /// Process the next chunk. An empty result means the processor is still
    /// buffering.
    fn process(&mut self, chunk: &[u8]) -> std::result::Result<Vec<u8>, ProcessingError>;

    /// Input ended; emit whatever is still held back.
    fn finish(&mut self) -> std::result::Result<Vec<u8>, ProcessingError>;
}

/// Run a fresh processor over a whole buffer.
///
/// Streaming stages implement `process_batch` with this so both paths share
/// one code path and agree byte for byte.
pub fn process_whole(
    processor: &mut dyn StreamProcessor,
    audio: &[u8],
) -> std::result::Result<Vec<u8>, ProcessingError> {
    let mut output = processor.process(audio)?;
    output.extend(processor.finish()?);
    Ok(output)
}

/// A registered stage, tagged with its capability.
#[derive(Clone)]
pub enum StageRef {
    Batch(Arc<dyn Stage>),
    Streaming(Arc<dyn StreamingStage>),
}

impl StageRef {
    pub fn batch(stage: impl Stage + 'static) -> Self {
        Self::Batch(Arc::new(stage))
    }

    pub fn streaming(stage: impl StreamingStage + 'static) -> Self {
        Self::Streaming(Arc::new(stage))
    }

    pub fn name(&self) -> &str {
        self.as_stage().name()
    }

    pub fn capability(&self) -> Capability {
        match self {
            Self::Batch(_) => Capability::Batch,
            Self::Streaming(_) => Capability::Streaming,
        }
    }

    pub fn is_streaming_capable(&self) -> bool {
        self.capability().is_streaming()
    }

    pub fn as_stage(&self) -> &dyn Stage {
        match self {
            Self::Batch(stage) => stage.as_ref(),
            Self::Streaming(stage) => stage.as_ref(),
        }
    }

    /// Transform a complete buffer, naming this stage in any failure.
    pub fn process_batch(&self, audio: &[u8]) -> Result<Vec<u8>> {
        self.as_stage()
            .process_batch(audio)
            .map_err(|e| AsrError::processing(self.name(), e))
    }

    /// Wrap a chunk stream through this stage's incremental path.
    ///
    /// Batch-only stages hand the stream back untouched.
    pub fn process_stream(
        &self,
        input: ChunkStream,
    ) -> std::result::Result<ChunkStream, ChunkStream> {
        match self {
            Self::Batch(_) => Err(input),
            Self::Streaming(stage) => Ok(Box::new(StageStream::new(
                stage.name().to_string(),
                stage.open(),
                input,
            ))),
        }
    }
}

impl fmt::Debug for StageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRef")
            .field("name", &self.name())
            .field("capability", &self.capability())
            .finish()
    }
}

/// Pull-driven iterator feeding an upstream stream through one processor.
///
/// Output chunks are numbered from 0 in emission order. After the first
/// error, or once the input ends, the upstream is released.
pub struct StageStream {
    stage: String,
    processor: Box<dyn StreamProcessor>,
    input: ChunkStream,
    next_sequence: u64,
    done: bool,
}

impl StageStream {
    pub fn new(stage: String, processor: Box<dyn StreamProcessor>, input: ChunkStream) -> Self {
        Self {
            stage,
            processor,
            input,
            next_sequence: 0,
            done: false,
        }
    }

    fn emit(&mut self, data: Vec<u8>) -> AudioChunk {
        let chunk = AudioChunk::new(data, self.next_sequence);
        self.next_sequence += 1;
        chunk
    }

    fn close(&mut self) {
        self.done = true;
        self.input = crate::stream::empty();
    }

    fn fail(&mut self, error: AsrError) -> Option<Result<AudioChunk>> {
        self.close();
        Some(Err(error))
    }
}

impl Iterator for StageStream {
    type Item = Result<AudioChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.input.next() {
                Some(Ok(chunk)) => match self.processor.process(&chunk.data) {
                    Ok(output) if output.is_empty() => continue,
                    Ok(output) => return Some(Ok(self.emit(output))),
                    Err(e) => {
                        let error = AsrError::processing(self.stage.as_str(), e);
                        return self.fail(error);
                    }
                },
                Some(Err(e)) => return self.fail(e),
                None => {
                    self.close();
                    return match self.processor.finish() {
                        Ok(output) if output.is_empty() => None,
                        Ok(output) => Some(Ok(self.emit(output))),
                        Err(e) => Some(Err(AsrError::processing(self.stage.as_str(), e))),
                    };
                }
            }
        }
        None
    }
}
