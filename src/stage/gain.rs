//! Constant gain applied sample by sample.

use crate::audio::pcm::{self, SampleAligner};
use crate::config::ComponentConfig;
use crate::defaults;
use crate::error::{AsrError, ProcessingError, Result};
use crate::stage::{Stage, StreamProcessor, StreamingStage, process_whole};

/// Multiplies every sample by a fixed factor, saturating at full scale.
#[derive(Debug, Clone)]
pub struct GainStage {
    name: String,
    factor: f32,
}

impl GainStage {
    pub fn new(name: &str, factor: f32) -> Self {
        Self {
            name: name.to_string(),
            factor,
        }
    }

    /// Reads `factor` (default 1.0). Must be finite and not negative.
    pub fn from_config(name: &str, config: &ComponentConfig) -> Result<Self> {
        let factor = config.get_f32("factor")?.unwrap_or(defaults::GAIN_FACTOR);
        if !factor.is_finite() || factor < 0.0 {
            return Err(AsrError::ConfigInvalidValue {
                key: format!("stages.{}.factor", name),
                message: format!("expected a non-negative number, got {}", factor),
            });
        }
        Ok(Self::new(name, factor))
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }
}

impl Stage for GainStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_batch(&self, audio: &[u8]) -> std::result::Result<Vec<u8>, ProcessingError> {
        process_whole(&mut *self.open(), audio)
    }
}

impl StreamingStage for GainStage {
    fn open(&self) -> Box<dyn StreamProcessor> {
        Box::new(GainProcessor {
            factor: self.factor as f64,
            aligner: SampleAligner::new(),
        })
    }
}

struct GainProcessor {
    factor: f64,
    aligner: SampleAligner,
}

impl StreamProcessor for GainProcessor {
    fn process(&mut self, chunk: &[u8]) -> std::result::Result<Vec<u8>, ProcessingError> {
        let scaled: Vec<i16> = self
            .aligner
            .push(chunk)
            .into_iter()
            .map(|s| pcm::clamp_sample(s as f64 * self.factor))
            .collect();
        Ok(pcm::encode(&scaled))
    }

    fn finish(&mut self) -> std::result::Result<Vec<u8>, ProcessingError> {
        self.aligner.finish()?;
        Ok(Vec::new())
    }
}
