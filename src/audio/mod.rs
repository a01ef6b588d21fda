//! Audio ingest.
//!
//! A cpal input stream decodes each stereo callback buffer and appends the
//! frames to a bounded [`SampleBuffer`] that the spectral estimator drains.

mod buffer;
mod system;

// Re-export public types
pub use buffer::{decode_le_f32, decode_le_i16, decode_le_i32, AudioFrame, SampleBuffer};
pub use system::{AudioSystem, DEFAULT_SOURCE};
