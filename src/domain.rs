use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::timing::{validate_timings, SlideTiming, ValidationError};

/// Corner of the output frame the shrunken overlay sits in (16px margin).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum OverlayPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Which of the two media tracks is shrunk into the overlay. `Primary` is the
/// narration video; `Secondary` is the assembled slide video.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum OverlaySource {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum QualityProfile {
    Draft,
    Standard,
    High,
}

/// Everything the final compositor needs for one output file.
///
/// The full schedule travels along (not just derived durations) so the
/// compositor can seek by absolute timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompositionRequest {
    /// Narration video path.
    pub primary_path: String,
    /// Assembled slide-video path.
    pub secondary_path: String,
    pub output_path: String,
    pub overlay_position: OverlayPosition,
    /// Overlay width as a fraction of the output width, 0.05..=0.50.
    pub overlay_relative_width: f64,
    pub overlay_source: OverlaySource,
    pub quality: QualityProfile,
    pub fps: u32,
    pub output_width: u32,
    pub output_height: u32,
    /// Expected total duration for progress reporting, when known.
    pub expected_duration_sec: Option<f64>,
    pub timings: Vec<SlideTiming>,
}

pub fn validate_request(req: &CompositionRequest) -> Result<(), ValidationError> {
    if !(req.overlay_relative_width >= 0.05 && req.overlay_relative_width <= 0.5) {
        return Err(ValidationError::OverlayWidthOutOfRange(
            req.overlay_relative_width,
        ));
    }
    validate_timings(&req.timings)
}
