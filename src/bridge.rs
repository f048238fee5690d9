//! Tokio front-end glue.
//!
//! Sessions are synchronous pull chains; these helpers run them on tokio's
//! blocking pool and connect them to async code through `mpsc` channels.

use crate::engine::TranscriptDelta;
use crate::error::{AsrError, Result};
use crate::service::{TranscribeRequest, TranscriptionService};
use crate::stream;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Transcribe a complete recording without blocking the runtime.
pub async fn transcribe_async(
    service: Arc<TranscriptionService>,
    audio: Vec<u8>,
    request: TranscribeRequest,
) -> Result<String> {
    tokio::task::spawn_blocking(move || service.transcribe(audio, &request))
        .await
        .map_err(|e| AsrError::Worker {
            message: format!("transcription task panicked: {}", e),
        })?
}

/// Run a streaming session fed by `input`, returning its results.
///
/// The session ends when `input` closes. Dropping the returned receiver
/// cancels it: the worker stops before pulling another chunk. A worker
/// already waiting on an idle producer stays parked on the blocking pool
/// until that producer sends or closes `input`.
pub fn spawn_streaming(
    service: Arc<TranscriptionService>,
    mut input: mpsc::Receiver<Vec<u8>>,
    request: TranscribeRequest,
    capacity: usize,
) -> mpsc::Receiver<Result<TranscriptDelta>> {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::task::spawn_blocking(move || {
        let results = tx.clone();
        let chunks = stream::from_results(std::iter::from_fn(move || {
            if results.is_closed() {
                return Some(Err(AsrError::SourceClosed));
            }
            input.blocking_recv().map(Ok)
        }));

        let deltas = match service.transcribe_streaming(chunks, &request) {
            Ok(deltas) => deltas,
            Err(e) => {
                if tx.blocking_send(Err(e)).is_err() {
                    tracing::debug!("session rejected after consumer went away");
                }
                return;
            }
        };

        for delta in deltas {
            if tx.is_closed() {
                break;
            }
            if tx.blocking_send(delta).is_err() {
                tracing::debug!("consumer dropped, stopping session");
                break;
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::engine::{EchoEngine, EngineRef, MockEngine};
    use crate::registry::Registry;

    fn service() -> Arc<TranscriptionService> {
        let registry = Registry::builder()
            .register_engine(EngineRef::streaming(EchoEngine::new("echo")))
            .register_engine(EngineRef::batch(MockEngine::new("mock").with_response("async")))
            .default_engine("echo")
            .build();
        Arc::new(TranscriptionService::new(registry, ServiceConfig::default()))
    }

    #[tokio::test]
    async fn transcribe_async_returns_text() {
        let text = transcribe_async(
            service(),
            vec![0; 4],
            TranscribeRequest::new().with_engine("mock"),
        )
        .await
        .unwrap();
        assert_eq!(text, "async");
    }

    #[tokio::test]
    async fn streaming_session_yields_deltas_in_order() {
        let (chunk_tx, chunk_rx) = mpsc::channel(4);
        let mut deltas = spawn_streaming(service(), chunk_rx, TranscribeRequest::new(), 4);

        for size in [3usize, 1, 4] {
            chunk_tx.send(vec![0; size]).await.unwrap();
        }
        drop(chunk_tx);

        let mut texts = Vec::new();
        while let Some(delta) = deltas.recv().await {
            texts.push(delta.unwrap().text);
        }
        assert_eq!(texts, vec!["3", "1", "4"]);
    }

    #[tokio::test]
    async fn resolution_error_is_delivered() {
        let (_chunk_tx, chunk_rx) = mpsc::channel::<Vec<u8>>(1);
        let mut deltas = spawn_streaming(
            service(),
            chunk_rx,
            TranscribeRequest::new().with_engine("missing"),
            1,
        );

        match deltas.recv().await {
            Some(Err(AsrError::EngineNotFound { name })) => assert_eq!(name, "missing"),
            other => panic!("Expected EngineNotFound, got {:?}", other),
        }
        assert!(deltas.recv().await.is_none());
    }
}
