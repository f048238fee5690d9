//! Peak normalization. Needs the whole buffer to find the peak, so it has no
//! streaming path.

use crate::audio::pcm;
use crate::config::ComponentConfig;
use crate::defaults;
use crate::error::{AsrError, ProcessingError, Result};
use crate::stage::Stage;

#[derive(Debug, Clone)]
pub struct NormalizeStage {
    name: String,
    target_volume: f32,
}

impl NormalizeStage {
    pub fn new(name: &str, target_volume: f32) -> Self {
        Self {
            name: name.to_string(),
            target_volume,
        }
    }

    /// Reads `target_volume`, a fraction of full scale in `(0, 1]`.
    pub fn from_config(name: &str, config: &ComponentConfig) -> Result<Self> {
        let target = config
            .get_f32("target_volume")?
            .unwrap_or(defaults::TARGET_VOLUME);
        if !(target > 0.0 && target <= 1.0) {
            return Err(AsrError::ConfigInvalidValue {
                key: format!("stages.{}.target_volume", name),
                message: format!("expected a value in (0, 1], got {}", target),
            });
        }
        Ok(Self::new(name, target))
    }

    pub fn target_volume(&self) -> f32 {
        self.target_volume
    }
}

impl Stage for NormalizeStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_batch(&self, audio: &[u8]) -> std::result::Result<Vec<u8>, ProcessingError> {
        let samples = pcm::decode(audio)?;
        let peak = samples
            .iter()
            .map(|&s| (s as i32).abs())
            .max()
            .unwrap_or(0);
        if peak == 0 {
            return Ok(audio.to_vec());
        }

        let full_scale = self.target_volume as f64 * i16::MAX as f64;
        let normalized: Vec<i16> = samples
            .into_iter()
            .map(|s| pcm::clamp_sample(s as f64 * full_scale / peak as f64))
            .collect();
        Ok(pcm::encode(&normalized))
    }
}
