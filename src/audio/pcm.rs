//! 16-bit little-endian PCM, the buffer encoding the built-in stages expect.

use crate::defaults::BYTES_PER_SAMPLE;
use crate::error::ProcessingError;

/// Decode a byte buffer into samples.
///
/// Fails when the length is not a whole number of samples.
pub fn decode(bytes: &[u8]) -> Result<Vec<i16>, ProcessingError> {
    if bytes.len() % BYTES_PER_SAMPLE != 0 {
        return Err(ProcessingError::new(format!(
            "expected 16-bit PCM, got odd byte length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Encode samples into a byte buffer.
pub fn encode(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Saturating conversion used after scaling a sample in floating point.
///
/// Truncates toward zero like an integer cast of the scaled value.
pub fn clamp_sample(value: f64) -> i16 {
    value.clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Splits incoming byte chunks into whole samples, holding back a dangling
/// byte until the next chunk completes it.
#[derive(Debug, Default, Clone)]
pub struct SampleAligner {
    carry: Option<u8>,
}

impl SampleAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every complete sample available after appending `bytes`.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<i16> {
        let mut samples = Vec::with_capacity(bytes.len() / BYTES_PER_SAMPLE + 1);
        let mut rest = bytes;
        if let Some(low) = self.carry.take() {
            match rest.split_first() {
                Some((&high, tail)) => {
                    samples.push(i16::from_le_bytes([low, high]));
                    rest = tail;
                }
                None => {
                    self.carry = Some(low);
                    return samples;
                }
            }
        }
        let mut pairs = rest.chunks_exact(BYTES_PER_SAMPLE);
        samples.extend(pairs.by_ref().map(|p| i16::from_le_bytes([p[0], p[1]])));
        if let [last] = pairs.remainder() {
            self.carry = Some(*last);
        }
        samples
    }

    /// Checks that the stream ended on a sample boundary.
    pub fn finish(&mut self) -> Result<(), ProcessingError> {
        match self.carry.take() {
            Some(_) => Err(ProcessingError::new(
                "expected 16-bit PCM, stream ended in the middle of a sample",
            )),
            None => Ok(()),
        }
    }
}
