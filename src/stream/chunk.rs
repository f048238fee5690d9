//! Audio chunks and the lazy sequences that carry them.

use crate::error::Result;

/// One ordered unit of audio bytes within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Encoded audio. Ownership moves with the chunk.
    pub data: Vec<u8>,
    /// Position within the session, starting at 0.
    pub sequence: u64,
}

impl AudioChunk {
    pub fn new(data: Vec<u8>, sequence: u64) -> Self {
        Self { data, sequence }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Lazy, pull-driven, non-restartable chunk sequence.
///
/// An `Err` item is terminal: consumers stop pulling after it, and every
/// adapter in this crate yields nothing further once it has produced one.
pub type ChunkStream = Box<dyn Iterator<Item = Result<AudioChunk>> + Send>;

/// Stamps session-local sequence numbers onto raw buffers as they are pulled.
pub struct Sequenced<I> {
    inner: I,
    next: u64,
    done: bool,
}

impl<I> Sequenced<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            next: 0,
            done: false,
        }
    }
}

impl<I> Iterator for Sequenced<I>
where
    I: Iterator<Item = Result<Vec<u8>>>,
{
    type Item = Result<AudioChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Ok(data)) => {
                let chunk = AudioChunk::new(data, self.next);
                self.next += 1;
                Some(Ok(chunk))
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

/// Chunk stream over buffers that are already available or produced lazily.
pub fn from_buffers<I>(buffers: I) -> ChunkStream
where
    I: IntoIterator<Item = Vec<u8>>,
    I::IntoIter: Send + 'static,
{
    Box::new(Sequenced::new(buffers.into_iter().map(Ok)))
}

/// Chunk stream over a source that can fail mid-way.
pub fn from_results<I>(buffers: I) -> ChunkStream
where
    I: IntoIterator<Item = Result<Vec<u8>>>,
    I::IntoIter: Send + 'static,
{
    Box::new(Sequenced::new(buffers.into_iter()))
}

/// A single buffer as a terminated one-element stream.
pub fn once(buffer: Vec<u8>) -> ChunkStream {
    from_buffers(std::iter::once(buffer))
}

/// An already-terminated stream.
pub fn empty() -> ChunkStream {
    Box::new(std::iter::empty())
}

/// Fully consume a stream into one buffer, in sequence order.
///
/// Stops at the first error and returns it; nothing partial is returned.
pub fn drain<I>(stream: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = Result<AudioChunk>>,
{
    let mut buffer = Vec::new();
    for chunk in stream {
        buffer.extend_from_slice(&chunk?.data);
    }
    Ok(buffer)
}
