//! WAV file input for the CLI and tests.

use crate::audio::pcm;
use crate::defaults::{BYTES_PER_SAMPLE, SAMPLE_RATE};
use crate::error::{AsrError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Decoded WAV audio as 16-bit mono PCM at a fixed rate.
/// Supports arbitrary sample rates and channel counts.
#[derive(Debug, Clone)]
pub struct WavAudio {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl WavAudio {
    /// Create from any reader, resampling to 16kHz mono.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Self::from_reader_at(reader, SAMPLE_RATE)
    }

    /// Create from any reader, resampling to `target_rate` mono.
    pub fn from_reader_at(reader: impl Read, target_rate: u32) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader).map_err(|e| AsrError::AudioFormat {
            message: format!("Failed to parse WAV file: {}", e),
        })?;

        let spec = wav_reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(AsrError::AudioFormat {
                message: format!(
                    "expected 16-bit integer PCM, got {}-bit {:?}",
                    spec.bits_per_sample, spec.sample_format
                ),
            });
        }

        let raw_samples: Vec<i16> = wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AsrError::AudioFormat {
                message: format!("Failed to read WAV samples: {}", e),
            })?;

        let mono_samples = downmix(raw_samples, spec.channels);

        let samples = if spec.sample_rate != target_rate {
            resample(&mono_samples, spec.sample_rate, target_rate)
        } else {
            mono_samples
        };

        Ok(Self {
            samples,
            sample_rate: target_rate,
        })
    }

    /// Open and decode a file on disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    /// The whole file as one PCM byte buffer.
    pub fn into_pcm_bytes(self) -> Vec<u8> {
        pcm::encode(&self.samples)
    }

    /// Split into PCM byte chunks of `chunk_ms` each (the last may be shorter).
    pub fn chunks(&self, chunk_ms: u32) -> Vec<Vec<u8>> {
        let per_chunk = ((self.sample_rate as u64 * chunk_ms as u64) / 1000).max(1) as usize;
        self.samples
            .chunks(per_chunk)
            .map(|chunk| {
                let mut bytes = Vec::with_capacity(chunk.len() * BYTES_PER_SAMPLE);
                bytes.extend(chunk.iter().flat_map(|s| s.to_le_bytes()));
                bytes
            })
            .collect()
    }
}

fn downmix(samples: Vec<i16>, channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples;
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
