use asrcore::audio::pcm;
use asrcore::config::ServiceConfig;
use asrcore::engine::{EchoEngine, Engine, RecognitionSession, StreamingEngine};
use asrcore::error::{AsrError, EngineError, ProcessingError};
use asrcore::stage::{GainStage, NormalizeStage, SmoothStage};
use asrcore::stream::{self, ChunkStream};
use asrcore::{
    EngineRef, Registry, Stage, StageRef, StreamProcessor, StreamingStage, TranscribeOptions,
    TranscribeRequest, TranscriptionService,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Counts how often a session touches it.
#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    chunks: AtomicUsize,
    batches: AtomicUsize,
}

impl Counters {
    fn chunks(&self) -> usize {
        self.chunks.load(Ordering::SeqCst)
    }
}

/// Streaming pass-through stage recording what it observes.
struct CountingStage {
    name: String,
    counters: Arc<Counters>,
}

struct CountingProcessor {
    counters: Arc<Counters>,
}

impl Stage for CountingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_batch(&self, audio: &[u8]) -> Result<Vec<u8>, ProcessingError> {
        self.counters.batches.fetch_add(1, Ordering::SeqCst);
        Ok(audio.to_vec())
    }
}

impl StreamingStage for CountingStage {
    fn open(&self) -> Box<dyn StreamProcessor> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(CountingProcessor {
            counters: self.counters.clone(),
        })
    }
}

impl StreamProcessor for CountingProcessor {
    fn process(&mut self, chunk: &[u8]) -> Result<Vec<u8>, ProcessingError> {
        self.counters.chunks.fetch_add(1, Ordering::SeqCst);
        Ok(chunk.to_vec())
    }

    fn finish(&mut self) -> Result<Vec<u8>, ProcessingError> {
        Ok(Vec::new())
    }
}

/// Batch-only pass-through stage.
struct Passthrough(&'static str);

impl Stage for Passthrough {
    fn name(&self) -> &str {
        self.0
    }

    fn process_batch(&self, audio: &[u8]) -> Result<Vec<u8>, ProcessingError> {
        Ok(audio.to_vec())
    }
}

/// Engine whose text is the hex dump of its input, chunk by chunk when
/// streaming.
struct HexEngine;

struct HexSession;

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl Engine for HexEngine {
    fn name(&self) -> &str {
        "hex"
    }

    fn transcribe(&self, audio: &[u8], _options: &TranscribeOptions) -> Result<String, EngineError> {
        Ok(hex(audio))
    }
}

impl StreamingEngine for HexEngine {
    fn open(&self, _options: &TranscribeOptions) -> Result<Box<dyn RecognitionSession>, EngineError> {
        Ok(Box::new(HexSession))
    }
}

impl RecognitionSession for HexSession {
    fn accept(&mut self, chunk: &[u8]) -> Result<Option<String>, EngineError> {
        Ok(Some(hex(chunk)))
    }

    fn finish(&mut self) -> Result<Option<String>, EngineError> {
        Ok(None)
    }
}

/// Batch-only view of [`HexEngine`].
struct BatchHex;

impl Engine for BatchHex {
    fn name(&self) -> &str {
        "batch-hex"
    }

    fn transcribe(&self, audio: &[u8], _options: &TranscribeOptions) -> Result<String, EngineError> {
        Ok(hex(audio))
    }
}

fn counting_stage(name: &str) -> (StageRef, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let stage = StageRef::streaming(CountingStage {
        name: name.to_string(),
        counters: counters.clone(),
    });
    (stage, counters)
}

fn service_with(stages: Vec<StageRef>) -> TranscriptionService {
    let mut builder = Registry::builder()
        .register_stage(StageRef::streaming(GainStage::new("gain", 1.5)))
        .register_stage(StageRef::streaming(SmoothStage::new("smooth", 5)))
        .register_stage(StageRef::batch(NormalizeStage::new("normalize", 0.7)))
        .register_engine(EngineRef::streaming(EchoEngine::new("echo")))
        .register_engine(EngineRef::streaming(HexEngine))
        .register_engine(EngineRef::batch(BatchHex))
        .default_engine("echo");
    for stage in stages {
        builder = builder.register_stage(stage);
    }
    TranscriptionService::new(builder.build(), ServiceConfig::default())
}

fn signal() -> Vec<u8> {
    let samples: Vec<i16> = (0..600).map(|i| ((i * 211) % 6007 - 3000) as i16).collect();
    pcm::encode(&samples)
}

fn chunked(audio: &[u8], size: usize) -> ChunkStream {
    stream::from_buffers(audio.chunks(size).map(<[u8]>::to_vec).collect::<Vec<_>>())
}

/// Source that counts how many chunks were pulled from it.
fn counted_source(chunks: Vec<Vec<u8>>) -> (ChunkStream, Arc<AtomicUsize>) {
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = pulled.clone();
    let source = stream::from_buffers(chunks.into_iter().inspect(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    (source, pulled)
}

fn collect_text(service: &TranscriptionService, input: ChunkStream, request: &TranscribeRequest) -> String {
    service
        .transcribe_streaming(input, request)
        .unwrap()
        .map(|delta| delta.unwrap().text)
        .collect()
}

#[test]
fn chunking_invariance_for_streaming_chain() {
    let service = service_with(Vec::new());
    let request = TranscribeRequest::new()
        .with_engine("hex")
        .with_stages(&["gain", "smooth"]);
    let audio = signal();

    let offline = service.transcribe(audio.clone(), &request).unwrap();
    let single = collect_text(&service, stream::once(audio.clone()), &request);
    assert_eq!(single, offline);

    for size in [2, 7, 64, 333] {
        let streamed = collect_text(&service, chunked(&audio, size), &request);
        assert_eq!(streamed, offline, "chunk size {}", size);
    }
}

#[test]
fn batch_stream_equivalence_for_mixed_chain() {
    let service = service_with(Vec::new());
    let request = TranscribeRequest::new()
        .with_engine("batch-hex")
        .with_stages(&["smooth", "normalize", "gain"]);
    let audio = signal();

    let offline = service.transcribe(audio.clone(), &request).unwrap();
    let streamed = collect_text(&service, chunked(&audio, 50), &request);

    assert_eq!(streamed, offline);
}

#[test]
fn unknown_stage_fails_before_anything_runs() {
    let (counter_stage, counters) = counting_stage("counter");
    let service = service_with(vec![counter_stage]);
    let (source, pulled) = counted_source(vec![vec![0; 4]; 3]);
    let request = TranscribeRequest::new().with_stages(&["counter", "denoise", "smooth"]);

    let result = service.transcribe_streaming(source, &request);

    match result {
        Err(AsrError::UnknownStage { name }) => assert_eq!(name, "denoise"),
        Err(other) => panic!("Expected UnknownStage, got {:?}", other),
        Ok(_) => panic!("Expected UnknownStage, got a stream"),
    }
    assert_eq!(pulled.load(Ordering::SeqCst), 0);
    assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
}

#[test]
fn non_streaming_engine_yields_once_after_all_chunks() {
    let service = service_with(Vec::new());
    let (source, pulled) = counted_source(vec![vec![1, 2]; 5]);
    let request = TranscribeRequest::new()
        .with_engine("batch-hex")
        .with_stages::<&str>(&[]);

    let mut deltas = service.transcribe_streaming(source, &request).unwrap();
    assert_eq!(pulled.load(Ordering::SeqCst), 0);

    let delta = deltas.next().unwrap().unwrap();
    assert_eq!(pulled.load(Ordering::SeqCst), 5);
    assert_eq!(delta.text, "01020102010201020102");
    assert_eq!(delta.covered_bytes, 10);
    assert!(delta.is_final);
    assert!(deltas.next().is_none());
}

#[test]
fn streaming_stage_after_drain_point_sees_one_chunk() {
    let (normalize_counter, counters) = counting_stage("streaming-normalize");
    let service = service_with(vec![
        StageRef::batch(Passthrough("denoise")),
        normalize_counter,
    ]);
    let request = TranscribeRequest::new().with_stages(&["denoise", "streaming-normalize"]);

    let texts: Vec<String> = service
        .transcribe_streaming(stream::from_buffers(vec![vec![0u8; 4]; 10]), &request)
        .unwrap()
        .map(|delta| delta.unwrap().text)
        .collect();

    assert_eq!(counters.chunks(), 1);
    assert_eq!(texts, vec!["40"]);
}

#[test]
fn cancelling_consumption_stops_upstream_work() {
    let (counter_stage, counters) = counting_stage("counter");
    let service = service_with(vec![counter_stage]);
    let (source, pulled) = counted_source(vec![vec![0; 2]; 20]);
    let request = TranscribeRequest::new().with_stages(&["counter"]);

    let mut deltas = service.transcribe_streaming(source, &request).unwrap();
    let first = deltas.next().unwrap().unwrap();
    assert_eq!(first.text, "2");
    assert!(!first.is_final);
    let seen = counters.chunks();
    let taken = pulled.load(Ordering::SeqCst);
    drop(deltas);

    thread::sleep(Duration::from_millis(50));
    assert_eq!(counters.chunks(), seen);
    assert_eq!(pulled.load(Ordering::SeqCst), taken);
    // One delta is held back until the next one exists.
    assert_eq!(taken, 2);
}

#[test]
fn cancelling_push_session_fails_producer() {
    let (counter_stage, counters) = counting_stage("counter");
    let service = service_with(vec![counter_stage]);
    let request = TranscribeRequest::new().with_stages(&["counter"]);
    let (sender, mut deltas) = service.open_session(&request).unwrap();

    let producer = thread::spawn(move || {
        let mut sent = 0usize;
        loop {
            match sender.send(vec![0; 2]) {
                Ok(()) => sent += 1,
                Err(AsrError::SourceClosed) => return sent,
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }
    });

    assert_eq!(deltas.next().unwrap().unwrap().text, "2");
    drop(deltas);
    let sent = producer.join().unwrap();

    let seen = counters.chunks();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(counters.chunks(), seen);
    assert!(sent >= 1);
    assert!(seen <= sent);
}

#[test]
fn drain_then_stream_example_yields_single_delta() {
    let (filter, counters) = counting_stage("filter");
    let registry = Registry::builder()
        .register_stage(StageRef::batch(Passthrough("gain")))
        .register_stage(filter)
        .register_engine(EngineRef::streaming(EchoEngine::new("echo")))
        .default_engine("echo")
        .build();
    let service = TranscriptionService::new(registry, ServiceConfig::default());
    let request = TranscribeRequest::new().with_stages(&["gain", "filter"]);
    let chunks = stream::from_buffers(vec![b"ab".to_vec(), b"cd".to_vec(), b"ef".to_vec()]);

    let deltas: Vec<_> = service
        .transcribe_streaming(chunks, &request)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].text, "6");
    assert_eq!(deltas[0].covered_bytes, 6);
    assert!(deltas[0].is_final);
    assert_eq!(counters.chunks(), 1);
}

#[test]
fn mid_stream_error_terminates_sequence() {
    let service = service_with(Vec::new());
    let request = TranscribeRequest::new().with_stages(&["normalize"]);
    // Odd total length: the batch-only stage rejects the drained buffer.
    let chunks = stream::from_buffers(vec![vec![0, 1], vec![2]]);

    let mut deltas = service.transcribe_streaming(chunks, &request).unwrap();

    match deltas.next() {
        Some(Err(AsrError::Processing { stage, .. })) => assert_eq!(stage, "normalize"),
        other => panic!("Expected processing error, got {:?}", other),
    }
    assert!(deltas.next().is_none());
}

#[test]
fn concurrent_sessions_do_not_share_state() {
    let service = Arc::new(service_with(Vec::new()));
    let request = TranscribeRequest::new()
        .with_engine("hex")
        .with_stages(&["smooth", "gain"]);
    let audio = signal();
    let expected = service.transcribe(audio.clone(), &request).unwrap();

    let handles: Vec<_> = (1..=8)
        .map(|i| {
            let service = service.clone();
            let request = request.clone();
            let audio = audio.clone();
            thread::spawn(move || collect_text(&service, chunked(&audio, i * 2), &request))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
