//! Transcription facade: the one entry point protocol front ends call.
//!
//! Every request resolves its engine and stages against one registry
//! snapshot before any audio is touched, so a failed lookup never leaves a
//! half-built session behind and a concurrent reload never mixes old and new
//! components within a session.

use crate::config::{Config, ServiceConfig};
use crate::engine::{DeltaStream, EngineRef, TranscribeOptions, TranscriptDelta};
use crate::error::{AsrError, EngineError, Result};
use crate::pipeline::PipelineChain;
use crate::registry::{ComponentCatalog, Registry, SharedRegistry};
use crate::stream::{self, ChunkSender, ChunkStream};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Which engine and stages to use, and how.
///
/// `None` fields fall back to the configured defaults. An explicit empty
/// stage list means "no preprocessing".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscribeRequest {
    pub engine: Option<String>,
    pub stages: Option<Vec<String>>,
    pub options: TranscribeOptions,
}

impl TranscribeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, engine: &str) -> Self {
        self.engine = Some(engine.to_string());
        self
    }

    pub fn with_stages<S: AsRef<str>>(mut self, stages: &[S]) -> Self {
        self.stages = Some(stages.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    pub fn with_options(mut self, options: TranscribeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.options.language = Some(language.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }
}

/// A resolved request: the engine and chain a session will run.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub engine: EngineRef,
    pub chain: PipelineChain,
}

impl SessionPlan {
    /// Stages that would buffer a whole stream.
    pub fn drain_points(&self) -> Vec<&str> {
        self.chain.drain_points()
    }

    /// True when the engine would transcribe a stream in one call.
    pub fn engine_fallback(&self) -> bool {
        !self.engine.is_streaming_capable()
    }

    /// True when a streaming session would not be incremental end to end.
    pub fn is_degraded(&self) -> bool {
        self.engine_fallback() || !self.chain.is_fully_streaming()
    }
}

impl fmt::Display for SessionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} => {} ({})",
            self.chain,
            self.engine.name(),
            self.engine.capability()
        )
    }
}

pub struct TranscriptionService {
    registry: SharedRegistry,
    settings: ServiceConfig,
    next_session: AtomicU64,
}

impl TranscriptionService {
    pub fn new(registry: impl Into<SharedRegistry>, settings: ServiceConfig) -> Self {
        Self {
            registry: registry.into(),
            settings,
            next_session: AtomicU64::new(1),
        }
    }

    /// Build the registry from `config` and wrap it.
    pub fn from_config(config: &Config, catalog: &ComponentCatalog) -> Result<Self> {
        let registry = Registry::from_config(config, catalog)?;
        Ok(Self::new(registry, config.service.clone()))
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ServiceConfig {
        &self.settings
    }

    /// Rebuild components from `config` and swap them in.
    ///
    /// Running sessions finish on the components they started with. On
    /// error the current registry stays in place.
    pub fn reload(&self, config: &Config, catalog: &ComponentCatalog) -> Result<()> {
        let registry = Registry::from_config(config, catalog)?;
        self.registry.replace(registry);
        tracing::info!("registry reloaded");
        Ok(())
    }

    /// Resolve a request without running anything.
    pub fn plan(&self, request: &TranscribeRequest) -> Result<SessionPlan> {
        let registry = self.registry.snapshot();
        let engine = registry.resolve_engine(request.engine.as_deref())?;
        let chain = match &request.stages {
            Some(stages) => registry.build_chain(stages)?,
            None => registry.build_chain(registry.default_stages())?,
        };
        Ok(SessionPlan { engine, chain })
    }

    /// Transcribe a complete recording.
    pub fn transcribe(&self, audio: Vec<u8>, request: &TranscribeRequest) -> Result<String> {
        let plan = self.plan(request)?;
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        if audio.is_empty() {
            return Err(AsrError::engine(
                plan.engine.name(),
                EngineError::InvalidAudio("empty audio buffer".to_string()),
            ));
        }

        tracing::debug!(session, plan = %plan, bytes = audio.len(), "offline transcription");
        let started = Instant::now();
        let processed = plan.chain.process_batch(audio)?;
        let text = plan.engine.transcribe(processed, &self.options_for(request))?;
        tracing::debug!(
            session,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "offline transcription finished"
        );
        Ok(text)
    }

    /// Transcribe a chunk sequence, yielding results as they become
    /// available.
    ///
    /// Resolution errors are returned here, before any chunk is pulled.
    /// Dropping the returned stream cancels the session.
    pub fn transcribe_streaming(
        &self,
        input: ChunkStream,
        request: &TranscribeRequest,
    ) -> Result<DeltaStream> {
        let plan = self.plan(request)?;
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.check_degradation(session, &plan)?;

        tracing::debug!(session, plan = %plan, "streaming transcription");
        let processed = plan.chain.process_stream(input);
        let deltas = plan
            .engine
            .transcribe_stream(processed, &self.options_for(request));
        Ok(Box::new(SessionStream {
            id: session,
            inner: deltas,
            delivered: 0,
            finished: false,
        }))
    }

    /// Open a push-style session: feed chunks through the sender while
    /// pulling results from the stream, typically on another thread.
    pub fn open_session(&self, request: &TranscribeRequest) -> Result<(ChunkSender, DeltaStream)> {
        let (sender, receiver) = stream::chunk_channel(self.settings.chunk_buffer.max(1));
        let deltas = self.transcribe_streaming(Box::new(receiver), request)?;
        Ok((sender, deltas))
    }

    fn options_for(&self, request: &TranscribeRequest) -> TranscribeOptions {
        let mut options = request.options.clone();
        if options.timeout.is_none() {
            options.timeout = self.settings.engine_timeout();
        }
        options
    }

    fn check_degradation(&self, session: u64, plan: &SessionPlan) -> Result<()> {
        if !plan.is_degraded() {
            return Ok(());
        }
        let stages: Vec<String> = plan.drain_points().into_iter().map(str::to_string).collect();
        if !self.settings.allow_degraded_streaming {
            return Err(AsrError::DegradedStreaming {
                engine: plan.engine.name().to_string(),
                stages,
                engine_fallback: plan.engine_fallback(),
            });
        }
        tracing::warn!(
            session,
            drain_stages = ?stages,
            engine_fallback = plan.engine_fallback(),
            "streaming session degrades to buffering"
        );
        Ok(())
    }
}

/// Delta stream of one session, logging how it ended.
struct SessionStream {
    id: u64,
    inner: DeltaStream,
    delivered: u64,
    finished: bool,
}

impl Iterator for SessionStream {
    type Item = Result<TranscriptDelta>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.inner.next() {
            Some(Ok(delta)) => {
                self.delivered += 1;
                Some(Ok(delta))
            }
            Some(Err(e)) => {
                self.finished = true;
                tracing::warn!(session = self.id, error = %e, "streaming session failed");
                Some(Err(e))
            }
            None => {
                self.finished = true;
                tracing::debug!(session = self.id, deltas = self.delivered, "streaming session finished");
                None
            }
        }
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                session = self.id,
                deltas = self.delivered,
                "streaming session cancelled by consumer"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EchoEngine, MockEngine};
    use crate::stage::{GainStage, NormalizeStage, StageRef};
    use std::thread;

    fn service(settings: ServiceConfig) -> TranscriptionService {
        let registry = Registry::builder()
            .register_stage(StageRef::streaming(GainStage::new("gain", 1.0)))
            .register_stage(StageRef::batch(NormalizeStage::new("normalize", 0.8)))
            .register_engine(EngineRef::streaming(EchoEngine::new("echo")))
            .register_engine(EngineRef::batch(MockEngine::new("mock").with_response("hello")))
            .default_engine("echo")
            .build();
        TranscriptionService::new(registry, settings)
    }

    #[test]
    fn transcribe_uses_default_engine() {
        let service = service(ServiceConfig::default());
        let text = service
            .transcribe(vec![0; 8], &TranscribeRequest::new())
            .unwrap();
        assert_eq!(text, "8");
    }

    #[test]
    fn transcribe_rejects_empty_audio() {
        let service = service(ServiceConfig::default());
        let error = service
            .transcribe(Vec::new(), &TranscribeRequest::new())
            .unwrap_err();
        assert!(matches!(
            error.engine_error(),
            Some(EngineError::InvalidAudio(_))
        ));
    }

    #[test]
    fn resolution_error_precedes_audio_checks() {
        let service = service(ServiceConfig::default());
        let request = TranscribeRequest::new().with_stages(&["missing"]);
        assert!(matches!(
            service.transcribe(Vec::new(), &request),
            Err(AsrError::UnknownStage { .. })
        ));
    }

    #[test]
    fn strict_mode_rejects_degraded_streaming() {
        let settings = ServiceConfig {
            allow_degraded_streaming: false,
            ..ServiceConfig::default()
        };
        let service = service(settings);
        let request = TranscribeRequest::new()
            .with_engine("mock")
            .with_stages(&["gain", "normalize"]);

        let result = service.transcribe_streaming(stream::once(vec![0, 0]), &request);

        match result {
            Err(AsrError::DegradedStreaming {
                engine,
                stages,
                engine_fallback,
            }) => {
                assert_eq!(engine, "mock");
                assert_eq!(stages, vec!["normalize"]);
                assert!(engine_fallback);
            }
            Err(other) => panic!("Expected DegradedStreaming, got {:?}", other),
            Ok(_) => panic!("Expected DegradedStreaming, got a stream"),
        }
    }

    #[test]
    fn strict_mode_allows_fully_streaming_plan() {
        let settings = ServiceConfig {
            allow_degraded_streaming: false,
            ..ServiceConfig::default()
        };
        let request = TranscribeRequest::new().with_stages(&["gain"]);
        assert!(
            service(settings)
                .transcribe_streaming(stream::once(vec![0, 0]), &request)
                .is_ok()
        );
    }

    #[test]
    fn configured_timeout_applies_when_request_has_none() {
        let settings = ServiceConfig {
            engine_timeout_ms: Some(250),
            ..ServiceConfig::default()
        };
        let service = service(settings);

        let options = service.options_for(&TranscribeRequest::new());
        assert_eq!(options.timeout, Some(Duration::from_millis(250)));

        let request = TranscribeRequest::new().with_timeout(Duration::from_secs(1));
        assert_eq!(
            service.options_for(&request).timeout,
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn open_session_streams_pushed_chunks() {
        let service = service(ServiceConfig::default());
        let (sender, deltas) = service.open_session(&TranscribeRequest::new()).unwrap();

        let producer = thread::spawn(move || {
            for size in [2usize, 4, 6] {
                sender.send(vec![0; size]).unwrap();
            }
        });

        let texts: Vec<String> = deltas.map(|d| d.unwrap().text).collect();
        producer.join().unwrap();
        assert_eq!(texts, vec!["2", "4", "6"]);
    }

    #[test]
    fn plan_display() {
        let service = service(ServiceConfig::default());
        let plan = service
            .plan(&TranscribeRequest::new().with_stages(&["gain", "normalize"]))
            .unwrap();
        assert_eq!(
            plan.to_string(),
            "Pipeline: gain -> normalize => echo (streaming)"
        );
        assert!(plan.is_degraded());
        assert!(!plan.engine_fallback());
    }
}
