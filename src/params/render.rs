//! Window and frame recording configuration.

use std::path::{Path, PathBuf};

/// Window configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Initial window width (pixels)
    pub window_width: u32,

    /// Initial window height (pixels)
    pub window_height: u32,

    /// Base window title; the active seed set and typed text are appended
    pub title: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_width: 768,
            window_height: 768,
            title: "Spectral Visualiser".to_string(),
        }
    }
}

/// Scale that fits an image into the window while preserving its aspect ratio.
///
/// Returns clip-space (x, y) extents in (0, 1].
pub fn letterbox_scale(window: (u32, u32), image: (u32, u32)) -> [f32; 2] {
    if window.0 == 0 || window.1 == 0 || image.0 == 0 || image.1 == 0 {
        return [1.0, 1.0];
    }
    let window_aspect = window.0 as f32 / window.1 as f32;
    let image_aspect = image.0 as f32 / image.1 as f32;
    if window_aspect > image_aspect {
        [image_aspect / window_aspect, 1.0]
    } else {
        [1.0, window_aspect / image_aspect]
    }
}

/// Frame recording configuration
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Directory receiving `frame_NNNNN.png`
    pub output_dir: PathBuf,
}

impl RecordingConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn frames_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Frame file path
    pub fn frame_path(&self, frame_num: u64) -> PathBuf {
        self.output_dir.join(format!("frame_{:05}.png", frame_num))
    }
}
