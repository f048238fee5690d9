//! Chunk sequences: the lazy, pull-driven representation audio takes while a
//! streaming session runs.

pub mod channel;
pub mod chunk;

pub use channel::{ChunkReceiver, ChunkSender, chunk_channel};
pub use chunk::{AudioChunk, ChunkStream, Sequenced, drain, empty, from_buffers, from_results, once};
