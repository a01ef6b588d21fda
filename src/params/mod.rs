//! Parameter definitions with units and documented semantics.
//!
//! All tunables live here with:
//! - Units (Hz, frames, pixels, seconds)
//! - Documented ranges and meanings
//! - A `validate()` where a bad value would only fail later

mod render;
mod spectral;
mod synthesis;

// Re-export all types
pub use render::{letterbox_scale, RecordingConfig, RenderConfig};
pub use spectral::{BufferConfig, PeriodogramMethod, SpectralConfig};
pub use synthesis::{NetworkParams, SynthesisConfig};
