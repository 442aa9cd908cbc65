use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TranscribeError;
use crate::note_event::NoteEvent;
use crate::settings::Settings;

/// Per-request overrides for the pitch-detection stage. Every field is
/// optional and falls back to the configured default independently, so a
/// partial override never clobbers the other parameters. Unknown keys are
/// rejected at deserialisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectionParams {
    pub onset_threshold: Option<f64>,
    pub frame_threshold: Option<f64>,
    pub minimum_note_length: Option<f64>,
    pub minimum_velocity: Option<f64>,
    pub merge_tolerance_ms: Option<f64>,
}

/// Fully-specified detection parameters, after merging with defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedDetectionParams {
    pub onset_threshold: f64,
    pub frame_threshold: f64,
    pub minimum_note_length: f64,
    pub minimum_velocity: f64,
    pub merge_tolerance_ms: f64,
}

impl DetectionParams {
    pub fn resolve(&self, settings: &Settings) -> ResolvedDetectionParams {
        ResolvedDetectionParams {
            onset_threshold: self.onset_threshold.unwrap_or(settings.onset_threshold),
            frame_threshold: self.frame_threshold.unwrap_or(settings.frame_threshold),
            minimum_note_length: self
                .minimum_note_length
                .unwrap_or(settings.minimum_note_length),
            minimum_velocity: self.minimum_velocity.unwrap_or(settings.minimum_velocity),
            merge_tolerance_ms: self
                .merge_tolerance_ms
                .unwrap_or(settings.merge_tolerance_ms),
        }
    }
}

/// Boundary to the external polyphonic pitch-detection model. The core
/// never implements this; callers plug in their detector and hand the
/// resulting events to the pipeline.
pub trait PitchDetector {
    fn detect(
        &self,
        audio_path: &Path,
        params: &ResolvedDetectionParams,
    ) -> Result<Vec<NoteEvent>, TranscribeError>;
}
