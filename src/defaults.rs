//! Default configuration constants for asrcore.
//!
//! Shared between the config layer, the built-in components and the CLI so
//! every entry point agrees on the same values.

/// Sample rate assumed for 16-bit PCM buffers when a component does not
/// configure one.
pub const SAMPLE_RATE: u32 = 16000;

/// Bytes per sample of the canonical PCM encoding (16-bit little endian).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Capacity of the bounded channel handed to chunk producers.
///
/// Small on purpose: a full channel blocks the producer, which is how a slow
/// session pushes back on its protocol front end.
pub const CHUNK_BUFFER: usize = 8;

/// Duration of the chunks the CLI cuts a WAV file into in streaming mode.
pub const CHUNK_MS: u32 = 100;

/// Default multiplier for the `gain` stage.
pub const GAIN_FACTOR: f32 = 1.0;

/// Default peak level for the `normalize` stage, as a fraction of full scale.
pub const TARGET_VOLUME: f32 = 0.8;

/// Smallest moving-average window the `smooth` stage accepts.
pub const MIN_SMOOTH_WINDOW: usize = 3;

/// Default text returned by the `mock` engine.
pub const MOCK_RESPONSE: &str = "mock transcription";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "ASRCORE";

/// Default smoothing window: one millisecond of audio, never below
/// [`MIN_SMOOTH_WINDOW`].
pub fn smooth_window(sample_rate: u32) -> usize {
    MIN_SMOOTH_WINDOW.max((sample_rate / 1000) as usize)
}
