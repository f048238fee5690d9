//! Ordered stage chains resolved by name from a registry snapshot.
//!
//! A chain is immutable once built and knows which of its stages are drain
//! points for a stream.

use crate::error::{AsrError, Result};
use crate::pipeline::adapter::{self, Representation};
use crate::registry::Registry;
use crate::stage::StageRef;
use crate::stream::ChunkStream;
use std::fmt;

/// An ordered list of stages resolved from a registry.
///
/// The chain shares its stages with the registry snapshot it was built
/// from. Building and cloning a chain never touches audio.
#[derive(Debug, Clone, Default)]
pub struct PipelineChain {
    stages: Vec<StageRef>,
}

impl PipelineChain {
    /// Resolve `names` in order. The first unknown name fails the whole
    /// build and nothing is constructed.
    pub fn build<S: AsRef<str>>(registry: &Registry, names: &[S]) -> Result<Self> {
        let stages = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                registry
                    .stage(name)
                    .cloned()
                    .ok_or_else(|| AsrError::UnknownStage {
                        name: name.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let chain = Self { stages };
        tracing::debug!(chain = %chain, drain_points = ?chain.drain_points(), "chain built");
        Ok(chain)
    }

    pub fn from_stages(stages: Vec<StageRef>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[StageRef] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(StageRef::name).collect()
    }

    /// Batch-only stages, where a streaming run buffers the whole stream.
    pub fn drain_points(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|stage| !stage.is_streaming_capable())
            .map(StageRef::name)
            .collect()
    }

    pub fn is_fully_streaming(&self) -> bool {
        self.stages.iter().all(StageRef::is_streaming_capable)
    }

    /// Run a complete buffer through every stage.
    pub fn process_batch(&self, audio: Vec<u8>) -> Result<Vec<u8>> {
        adapter::run(self, Representation::Buffer(audio))?.into_buffer()
    }

    /// Wrap a chunk stream through every stage. Lazy: nothing runs until the
    /// result is pulled.
    pub fn process_stream(&self, input: ChunkStream) -> ChunkStream {
        adapter::run_stream(self, input)
    }
}

impl fmt::Display for PipelineChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stages.is_empty() {
            write!(f, "Empty Pipeline")
        } else {
            write!(f, "Pipeline: {}", self.names().join(" -> "))
        }
    }
}
