//! Centered moving-average smoothing, a light noise reduction.
//!
//! For a window `w` and `n` samples, output sample `i` is the mean of
//! `x[clamp(i - w/2 + k, 0, n - 1)]` for `k` in `0..w`: the signal is
//! edge-padded on both sides. Buffers of at most `w` samples pass through
//! unchanged.
//!
//! The streaming processor emits sample `i` as soon as the samples it
//! depends on have arrived, and holds everything back until more than `w`
//! samples were seen so short inputs can still pass through untouched. Its
//! memory is bounded by the window, not by the stream length.

use crate::audio::pcm::{self, SampleAligner};
use crate::config::ComponentConfig;
use crate::defaults;
use crate::error::{AsrError, ProcessingError, Result};
use crate::stage::{Stage, StreamProcessor, StreamingStage, process_whole};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct SmoothStage {
    name: String,
    window: usize,
}

impl SmoothStage {
    pub fn new(name: &str, window: usize) -> Self {
        Self {
            name: name.to_string(),
            window: window.max(1),
        }
    }

    /// Reads `window` (samples) or derives it from `sample_rate`.
    pub fn from_config(name: &str, config: &ComponentConfig) -> Result<Self> {
        let window = match config.get_usize("window")? {
            Some(window) => window,
            None => {
                let rate = config.get_u64("sample_rate")?.unwrap_or(defaults::SAMPLE_RATE as u64);
                defaults::smooth_window(rate.min(u32::MAX as u64) as u32)
            }
        };
        if window == 0 {
            return Err(AsrError::ConfigInvalidValue {
                key: format!("stages.{}.window", name),
                message: "window must be at least one sample".to_string(),
            });
        }
        Ok(Self::new(name, window))
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Stage for SmoothStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_batch(&self, audio: &[u8]) -> std::result::Result<Vec<u8>, ProcessingError> {
        process_whole(&mut *self.open(), audio)
    }
}

impl StreamingStage for SmoothStage {
    fn open(&self) -> Box<dyn StreamProcessor> {
        Box::new(SmoothProcessor::new(self.window))
    }
}

struct SmoothProcessor {
    window: usize,
    half: usize,
    aligner: SampleAligner,
    // Samples with index >= base.
    history: VecDeque<i16>,
    base: usize,
    seen: usize,
    next: usize,
}

impl SmoothProcessor {
    fn new(window: usize) -> Self {
        Self {
            window,
            half: window / 2,
            aligner: SampleAligner::new(),
            history: VecDeque::with_capacity(window * 2),
            base: 0,
            seen: 0,
            next: 0,
        }
    }

    fn lookahead(&self) -> usize {
        self.window - 1 - self.half
    }

    /// Mean around output index `i`; `last` is the final index once known.
    fn average(&self, i: usize, last: Option<usize>) -> i16 {
        let mut sum: i64 = 0;
        for k in 0..self.window {
            let mut idx = (i + k).saturating_sub(self.half);
            if let Some(last) = last {
                idx = idx.min(last);
            }
            sum += self.history[idx - self.base] as i64;
        }
        (sum as f64 / self.window as f64) as i16
    }

    fn advance(&mut self, output: &mut Vec<i16>, last: Option<usize>) {
        let value = self.average(self.next, last);
        output.push(value);
        self.next += 1;
        // Output `next` reads from `next - half` onwards.
        let keep_from = self.next.saturating_sub(self.half);
        while self.base < keep_from && !self.history.is_empty() {
            self.history.pop_front();
            self.base += 1;
        }
    }
}

impl StreamProcessor for SmoothProcessor {
    fn process(&mut self, chunk: &[u8]) -> std::result::Result<Vec<u8>, ProcessingError> {
        let samples = self.aligner.push(chunk);
        self.seen += samples.len();
        self.history.extend(samples);

        let mut output = Vec::new();
        if self.seen > self.window {
            while self.next + self.lookahead() < self.seen {
                self.advance(&mut output, None);
            }
        }
        Ok(pcm::encode(&output))
    }

    fn finish(&mut self) -> std::result::Result<Vec<u8>, ProcessingError> {
        self.aligner.finish()?;
        if self.seen <= self.window {
            let raw: Vec<i16> = self.history.drain(..).collect();
            return Ok(pcm::encode(&raw));
        }
        let last = self.seen - 1;
        let mut output = Vec::new();
        while self.next < self.seen {
            self.advance(&mut output, Some(last));
        }
        Ok(pcm::encode(&output))
    }
}
