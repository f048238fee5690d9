//! Stage chains and the adapter that runs them over buffers or chunk
//! streams.

pub mod adapter;
pub mod chain;

pub use adapter::Representation;
pub use chain::PipelineChain;
