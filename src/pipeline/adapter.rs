//! Runs a chain over either a buffer or a chunk stream, choosing per stage
//! between its incremental path and its whole-buffer path.
//!
//! In stream mode a batch-only stage is a drain point: the first pull on its
//! output consumes the entire upstream, runs the stage once, and yields a
//! single chunk. Streaming stages downstream of a drain point therefore see
//! one chunk. In buffer mode every stage runs on the whole buffer.

use crate::error::Result;
use crate::pipeline::PipelineChain;
use crate::stage::StageRef;
use crate::stream::{self, AudioChunk, ChunkStream};

/// The form audio is in between two stages.
pub enum Representation {
    Buffer(Vec<u8>),
    Stream(ChunkStream),
}

impl Representation {
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// Collapse to one buffer, draining a stream if needed.
    pub fn into_buffer(self) -> Result<Vec<u8>> {
        match self {
            Self::Buffer(buffer) => Ok(buffer),
            Self::Stream(chunks) => stream::drain(chunks),
        }
    }

    /// View as a stream; a buffer becomes a one-chunk stream.
    pub fn into_stream(self) -> ChunkStream {
        match self {
            Self::Buffer(buffer) => stream::once(buffer),
            Self::Stream(chunks) => chunks,
        }
    }
}

/// Apply one stage. Buffers are processed eagerly; streams are wrapped.
pub fn apply(stage: &StageRef, current: Representation) -> Result<Representation> {
    match current {
        Representation::Buffer(buffer) => Ok(Representation::Buffer(stage.process_batch(&buffer)?)),
        Representation::Stream(chunks) => Ok(Representation::Stream(wrap(stage, chunks))),
    }
}

/// Apply every stage of `chain` in order. An empty chain is the identity.
pub fn run(chain: &PipelineChain, input: Representation) -> Result<Representation> {
    chain
        .stages()
        .iter()
        .try_fold(input, |current, stage| apply(stage, current))
}

/// Stream-mode [`run`], which cannot fail before the stream is pulled.
pub fn run_stream(chain: &PipelineChain, input: ChunkStream) -> ChunkStream {
    let drains = chain.drain_points();
    if !drains.is_empty() {
        tracing::debug!(
            stages = ?drains,
            "batch-only stages will buffer the whole stream"
        );
    }
    chain
        .stages()
        .iter()
        .fold(input, |upstream, stage| wrap(stage, upstream))
}

fn wrap(stage: &StageRef, upstream: ChunkStream) -> ChunkStream {
    stage
        .process_stream(upstream)
        .unwrap_or_else(|upstream| -> ChunkStream {
            Box::new(DrainedStage {
                stage: stage.clone(),
                input: Some(upstream),
            })
        })
}

/// A batch-only stage spliced into a stream.
struct DrainedStage {
    stage: StageRef,
    input: Option<ChunkStream>,
}

impl Iterator for DrainedStage {
    type Item = Result<AudioChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        let input = self.input.take()?;
        tracing::debug!(stage = self.stage.name(), "draining stream into batch stage");
        let buffer = match stream::drain(input) {
            Ok(buffer) => buffer,
            Err(e) => return Some(Err(e)),
        };
        if buffer.is_empty() {
            return None;
        }
        Some(
            self.stage
                .process_batch(&buffer)
                .map(|output| AudioChunk::new(output, 0)),
        )
    }
}
