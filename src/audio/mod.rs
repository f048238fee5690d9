pub mod pcm;
pub mod wav;

pub use wav::WavAudio;
