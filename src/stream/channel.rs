//! Bounded chunk channel connecting a producer (protocol front end) to a
//! session's pull chain.
//!
//! The producer blocks when the channel is full, the session blocks when it
//! is empty. Dropping the sender ends the session's input; dropping the
//! receiver (the session) makes further sends fail.

use crate::error::{AsrError, Result};
use crate::stream::chunk::AudioChunk;
use crossbeam_channel::{Receiver, Sender, bounded};

/// Producer half. Clone it to feed one session from several threads; the
/// input ends once every clone is dropped.
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: Sender<Vec<u8>>,
}

impl ChunkSender {
    /// Hand one buffer to the session, blocking while the channel is full.
    ///
    /// Fails with [`AsrError::SourceClosed`] once the session stopped pulling.
    pub fn send(&self, buffer: Vec<u8>) -> Result<()> {
        self.tx.send(buffer).map_err(|_| AsrError::SourceClosed)
    }

    /// Signal end of input.
    pub fn close(self) {}
}

/// Consumer half; a [`ChunkStream`](crate::stream::ChunkStream) item source.
#[derive(Debug)]
pub struct ChunkReceiver {
    rx: Receiver<Vec<u8>>,
    next: u64,
}

impl Iterator for ChunkReceiver {
    type Item = Result<AudioChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        // Disconnected and empty means the producer finished.
        let data = self.rx.recv().ok()?;
        let chunk = AudioChunk::new(data, self.next);
        self.next += 1;
        Some(Ok(chunk))
    }
}

/// Create a chunk channel holding at most `capacity` pending buffers.
pub fn chunk_channel(capacity: usize) -> (ChunkSender, ChunkReceiver) {
    let (tx, rx) = bounded(capacity);
    (ChunkSender { tx }, ChunkReceiver { rx, next: 0 })
}
