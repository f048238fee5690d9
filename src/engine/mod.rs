//! Recognition engines.
//!
//! Every engine transcribes a complete buffer. Engines that can follow a
//! chunk sequence implement [`StreamingEngine`]; for the others,
//! [`EngineRef::transcribe_stream`] drains the sequence and transcribes it
//! once.

pub mod echo;
pub mod mock;

pub use echo::EchoEngine;
pub use mock::MockEngine;

use crate::error::{AsrError, EngineError, Result};
use crate::stage::Capability;
use crate::stream::{self, ChunkStream};
use crossbeam_channel::RecvTimeoutError;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Per-request recognition options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscribeOptions {
    /// Language hint for engines that support several.
    pub language: Option<String>,
    /// Upper bound for one whole-buffer engine call.
    pub timeout: Option<Duration>,
}

impl TranscribeOptions {
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// One incremental result of a streaming session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptDelta {
    pub text: String,
    /// Position among the session's deltas, starting at 0.
    pub index: u64,
    /// Engine input bytes consumed when this delta was produced. Never
    /// decreases within a session.
    pub covered_bytes: u64,
    /// Last delta of the session.
    pub is_final: bool,
}

/// Lazy sequence of transcription results. `Err` is terminal.
pub type DeltaStream = Box<dyn Iterator<Item = Result<TranscriptDelta>> + Send>;

/// Speech recognition over a complete buffer.
///
/// Shared between concurrent sessions.
pub trait Engine: Send + Sync {
    fn name(&self) -> &str;

    fn transcribe(
        &self,
        audio: &[u8],
        options: &TranscribeOptions,
    ) -> std::result::Result<String, EngineError>;
}

/// An engine that can recognize audio while it arrives.
pub trait StreamingEngine: Engine {
    /// Start a recognition session with its own state.
    fn open(
        &self,
        options: &TranscribeOptions,
    ) -> std::result::Result<Box<dyn RecognitionSession>, EngineError>;
}

/// State of one streaming recognition.
pub trait RecognitionSession: Send {
    /// Consume the next chunk, returning new text if any is ready.
    fn accept(&mut self, chunk: &[u8]) -> std::result::Result<Option<String>, EngineError>;

    /// Input ended; return any text still pending.
    fn finish(&mut self) -> std::result::Result<Option<String>, EngineError>;
}

/// A registered engine, tagged with its capability.
#[derive(Clone)]
pub enum EngineRef {
    Batch(Arc<dyn Engine>),
    Streaming(Arc<dyn StreamingEngine>),
}

impl EngineRef {
    pub fn batch(engine: impl Engine + 'static) -> Self {
        Self::Batch(Arc::new(engine))
    }

    pub fn streaming(engine: impl StreamingEngine + 'static) -> Self {
        Self::Streaming(Arc::new(engine))
    }

    pub fn name(&self) -> &str {
        self.as_engine().name()
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

    pub fn as_engine(&self) -> &dyn Engine {
        match self {
            Self::Batch(engine) => engine.as_ref(),
            Self::Streaming(engine) => engine.as_ref(),
        }
    }

    fn shared(&self) -> Arc<dyn Engine> {
        match self {
            Self::Batch(engine) => engine.clone(),
            Self::Streaming(engine) => engine.clone(),
        }
    }

    /// Transcribe a complete buffer, honoring `options.timeout`.
    ///
    /// With a timeout the call runs on a worker thread. A call that overruns
    /// is abandoned: its result is discarded when it eventually returns.
    pub fn transcribe(&self, audio: Vec<u8>, options: &TranscribeOptions) -> Result<String> {
        let name = self.name().to_string();
        let Some(limit) = options.timeout else {
            return self
                .as_engine()
                .transcribe(&audio, options)
                .map_err(|e| AsrError::engine(name, e));
        };

        let engine = self.shared();
        let call_options = options.clone();
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::Builder::new()
            .name(format!("engine-{}", name))
            .spawn(move || {
                let result = engine.transcribe(&audio, &call_options);
                if tx.send(result).is_err() {
                    tracing::debug!(engine = engine.name(), "discarding result of abandoned call");
                }
            })?;

        match rx.recv_timeout(limit) {
            Ok(result) => result.map_err(|e| AsrError::engine(name, e)),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    engine = %name,
                    timeout_ms = limit.as_millis() as u64,
                    "engine call timed out; worker thread abandoned and still running"
                );
                Err(AsrError::engine(name, EngineError::Timeout(limit)))
            }
            Err(RecvTimeoutError::Disconnected) => Err(AsrError::Worker {
                message: format!("engine '{}' exited without a result", name),
            }),
        }
    }

    /// Transcribe a chunk sequence.
    ///
    /// Streaming engines follow the sequence natively. Batch engines drain
    /// it, transcribe once, and yield exactly one delta; an empty sequence
    /// yields none. Nothing runs until the returned stream is pulled.
    pub fn transcribe_stream(&self, input: ChunkStream, options: &TranscribeOptions) -> DeltaStream {
        match self {
            Self::Streaming(engine) => Box::new(NativeTranscription {
                engine: engine.clone(),
                options: options.clone(),
                session: None,
                input,
                covered: 0,
                index: 0,
                pending: None,
                queued: None,
                done: false,
            }),
            Self::Batch(_) => Box::new(DrainedTranscription {
                engine: self.clone(),
                options: options.clone(),
                input: Some(input),
            }),
        }
    }
}

impl fmt::Debug for EngineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRef")
            .field("name", &self.name())
            .field("capability", &self.capability())
            .finish()
    }
}

/// Native streaming path.
///
/// The most recent delta is held back until the next one arrives or the
/// input ends, so the session's last delta can be marked final even when
/// `finish()` has nothing to add.
struct NativeTranscription {
    engine: Arc<dyn StreamingEngine>,
    options: TranscribeOptions,
    session: Option<Box<dyn RecognitionSession>>,
    input: ChunkStream,
    covered: u64,
    index: u64,
    pending: Option<TranscriptDelta>,
    queued: Option<Result<TranscriptDelta>>,
    done: bool,
}

impl NativeTranscription {
    fn release(&mut self) {
        self.done = true;
        self.session = None;
        self.input = stream::empty();
    }

    /// Deliver the held-back delta first; the error follows it.
    fn fail(&mut self, error: AsrError) -> Option<Result<TranscriptDelta>> {
        self.release();
        match self.pending.take() {
            Some(previous) => {
                self.queued = Some(Err(error));
                Some(Ok(previous))
            }
            None => Some(Err(error)),
        }
    }

    fn fail_engine(&mut self, error: EngineError) -> Option<Result<TranscriptDelta>> {
        let error = AsrError::engine(self.engine.name(), error);
        self.fail(error)
    }

    fn delta(&mut self, text: String, is_final: bool) -> TranscriptDelta {
        let delta = TranscriptDelta {
            text,
            index: self.index,
            covered_bytes: self.covered,
            is_final,
        };
        self.index += 1;
        delta
    }

    fn complete(&mut self, finished: Option<String>) -> Option<Result<TranscriptDelta>> {
        self.release();
        match (self.pending.take(), finished) {
            (Some(mut last), None) => {
                last.is_final = true;
                Some(Ok(last))
            }
            (None, Some(text)) => Some(Ok(self.delta(text, true))),
            (Some(previous), Some(text)) => {
                let last = self.delta(text, true);
                self.queued = Some(Ok(last));
                Some(Ok(previous))
            }
            (None, None) => None,
        }
    }
}

impl Iterator for NativeTranscription {
    type Item = Result<TranscriptDelta>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(item) = self.queued.take() {
            return Some(item);
        }
        if self.done {
            return None;
        }
        if self.session.is_none() {
            match self.engine.open(&self.options) {
                Ok(session) => self.session = Some(session),
                Err(e) => return self.fail_engine(e),
            }
        }

        loop {
            match self.input.next() {
                Some(Ok(chunk)) => {
                    self.covered += chunk.len() as u64;
                    let accepted = self.session.as_mut()?.accept(&chunk.data);
                    match accepted {
                        Ok(Some(text)) => {
                            let delta = self.delta(text, false);
                            if let Some(previous) = self.pending.replace(delta) {
                                return Some(Ok(previous));
                            }
                        }
                        Ok(None) => {}
                        Err(e) => return self.fail_engine(e),
                    }
                }
                Some(Err(e)) => return self.fail(e),
                None => {
                    let finished = self.session.as_mut()?.finish();
                    return match finished {
                        Ok(text) => self.complete(text),
                        Err(e) => self.fail_engine(e),
                    };
                }
            }
        }
    }
}

struct DrainedTranscription {
    engine: EngineRef,
    options: TranscribeOptions,
    input: Option<ChunkStream>,
}

impl Iterator for DrainedTranscription {
    type Item = Result<TranscriptDelta>;

    fn next(&mut self) -> Option<Self::Item> {
        let input = self.input.take()?;
        tracing::debug!(
            engine = self.engine.name(),
            "engine has no streaming path, draining input"
        );
        let audio = match stream::drain(input) {
            Ok(audio) => audio,
            Err(e) => return Some(Err(e)),
        };
        if audio.is_empty() {
            return None;
        }

        let covered_bytes = audio.len() as u64;
        Some(
            self.engine
                .transcribe(audio, &self.options)
                .map(|text| TranscriptDelta {
                    text,
                    index: 0,
                    covered_bytes,
                    is_final: true,
                }),
        )
    }
}
