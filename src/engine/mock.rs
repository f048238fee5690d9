use crate::config::ComponentConfig;
use crate::defaults;
use crate::engine::{Engine, TranscribeOptions};
use crate::error::{AsrError, EngineError, Result};
use std::time::Duration;

/// Batch-only engine with a canned answer, for tests and dry runs.
#[derive(Debug, Clone)]
pub struct MockEngine {
    name: String,
    response: String,
    failure: Option<EngineError>,
    delay: Option<Duration>,
}

impl MockEngine {
    /// Create a new mock engine with default settings
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            response: defaults::MOCK_RESPONSE.to_string(),
            failure: None,
            delay: None,
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail every call with `error`
    pub fn with_failure(mut self, error: EngineError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Build from an `[engines.<name>]` section.
    ///
    /// Keys: `response`, `delay_ms`, and `fail` (`"invalid_audio"` makes
    /// every call fail; `"model_unavailable"` makes construction fail).
    pub fn from_config(name: &str, config: &ComponentConfig) -> Result<Self> {
        let mut engine = Self::new(name);
        if let Some(response) = config.get_str("response")? {
            engine = engine.with_response(response);
        }
        if let Some(ms) = config.get_u64("delay_ms")? {
            engine = engine.with_delay(Duration::from_millis(ms));
        }
        match config.get_str("fail")? {
            None => {}
            Some("invalid_audio") => {
                engine = engine.with_failure(EngineError::InvalidAudio(
                    "mock configured to reject audio".to_string(),
                ));
            }
            Some("model_unavailable") => {
                return Err(AsrError::engine(
                    name,
                    EngineError::ModelUnavailable("mock configured without a model".to_string()),
                ));
            }
            Some(other) => {
                return Err(AsrError::ConfigInvalidValue {
                    key: format!("engines.{}.fail", name),
                    message: format!(
                        "expected \"invalid_audio\" or \"model_unavailable\", got \"{}\"",
                        other
                    ),
                });
            }
        }
        Ok(engine)
    }
}

impl Engine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn transcribe(
        &self,
        _audio: &[u8],
        _options: &TranscribeOptions,
    ) -> std::result::Result<String, EngineError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.response.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_engine_returns_response() {
        let engine = MockEngine::new("test").with_response("Hello, this is a test");

        let result = engine.transcribe(&[0u8; 100], &TranscribeOptions::default());

        assert_eq!(result.unwrap(), "Hello, this is a test");
    }

    #[test]
    fn test_mock_engine_default_response() {
        let engine = MockEngine::new("test");
        assert_eq!(
            engine
                .transcribe(&[0u8; 2], &TranscribeOptions::default())
                .unwrap(),
            defaults::MOCK_RESPONSE
        );
    }

    #[test]
    fn test_mock_engine_returns_error_when_configured() {
        let engine = MockEngine::new("test")
            .with_failure(EngineError::InvalidAudio("too short".to_string()));

        let result = engine.transcribe(&[0u8; 2], &TranscribeOptions::default());

        assert_eq!(
            result,
            Err(EngineError::InvalidAudio("too short".to_string()))
        );
    }

    #[test]
    fn test_mock_engine_builder_pattern() {
        let engine = MockEngine::new("model")
            .with_response("first response")
            .with_response("second response");

        let result = engine
            .transcribe(&[0u8; 10], &TranscribeOptions::default())
            .unwrap();
        assert_eq!(result, "second response");
    }

    #[test]
    fn test_engine_trait_is_object_safe() {
        let engine: Box<dyn Engine> = Box::new(MockEngine::new("boxed").with_response("boxed test"));

        assert_eq!(engine.name(), "boxed");
        assert_eq!(
            engine
                .transcribe(&[0u8; 4], &TranscribeOptions::default())
                .unwrap(),
            "boxed test"
        );
    }

    #[test]
    fn test_from_config_reads_keys() {
        let config = ComponentConfig::new("mock")
            .with("response", "configured")
            .with("delay_ms", 1);
        let engine = MockEngine::from_config("m", &config).unwrap();

        assert_eq!(engine.name(), "m");
        assert_eq!(engine.delay, Some(Duration::from_millis(1)));
        assert_eq!(
            engine
                .transcribe(&[0u8; 2], &TranscribeOptions::default())
                .unwrap(),
            "configured"
        );
    }

    #[test]
    fn test_from_config_model_unavailable() {
        let config = ComponentConfig::new("mock").with("fail", "model_unavailable");

        let error = MockEngine::from_config("m", &config).unwrap_err();

        assert!(matches!(
            error.engine_error(),
            Some(EngineError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_from_config_invalid_audio() {
        let config = ComponentConfig::new("mock").with("fail", "invalid_audio");
        let engine = MockEngine::from_config("m", &config).unwrap();

        assert!(matches!(
            engine.transcribe(&[0u8; 2], &TranscribeOptions::default()),
            Err(EngineError::InvalidAudio(_))
        ));
    }

    #[test]
    fn test_from_config_rejects_unknown_failure_mode() {
        let config = ComponentConfig::new("mock").with("fail", "sometimes");
        assert!(matches!(
            MockEngine::from_config("m", &config),
            Err(AsrError::ConfigInvalidValue { .. })
        ));
    }
}
