use serde::{Deserialize, Serialize};

use crate::error::TranscribeError;

/// Pipeline configuration with process defaults.
///
/// The record is threaded explicitly into the filter, solver and emitters;
/// there is no global instance. `from_env` layers `GT_`-prefixed
/// environment variables over the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Notes whose onsets fall within this window form one chord.
    pub chord_window_ms: f64,
    /// Maximum fret span between fretted notes of one chord.
    pub max_fret_span: u8,
    pub position_jump_weight: f64,
    pub stretch_weight: f64,
    pub high_fret_penalty_weight: f64,
    pub tempo_bpm: u32,
    pub ticks_per_beat: u32,
    /// Detections quieter than this are dropped.
    pub minimum_velocity: f64,
    /// Same-pitch notes separated by at most this gap are merged.
    pub merge_tolerance_ms: f64,
    pub onset_threshold: f64,
    pub frame_threshold: f64,
    pub minimum_note_length: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            chord_window_ms: 50.0,
            max_fret_span: 5,
            position_jump_weight: 1.5,
            stretch_weight: 0.8,
            high_fret_penalty_weight: 0.15,
            tempo_bpm: 120,
            ticks_per_beat: 960,
            minimum_velocity: 0.4,
            merge_tolerance_ms: 30.0,
            onset_threshold: 0.6,
            frame_threshold: 0.5,
            minimum_note_length: 0.11,
        }
    }
}

const ENV_PREFIX: &str = "GT_";

impl Settings {
    pub fn from_env() -> Result<Self, TranscribeError> {
        let mut settings = Settings::default();
        read_env("CHORD_WINDOW_MS", &mut settings.chord_window_ms)?;
        read_env("MAX_FRET_SPAN", &mut settings.max_fret_span)?;
        read_env("POSITION_JUMP_WEIGHT", &mut settings.position_jump_weight)?;
        read_env("STRETCH_WEIGHT", &mut settings.stretch_weight)?;
        read_env(
            "HIGH_FRET_PENALTY_WEIGHT",
            &mut settings.high_fret_penalty_weight,
        )?;
        read_env("TEMPO_BPM", &mut settings.tempo_bpm)?;
        read_env("TICKS_PER_BEAT", &mut settings.ticks_per_beat)?;
        read_env("MINIMUM_VELOCITY", &mut settings.minimum_velocity)?;
        read_env("MERGE_TOLERANCE_MS", &mut settings.merge_tolerance_ms)?;
        read_env("ONSET_THRESHOLD", &mut settings.onset_threshold)?;
        read_env("FRAME_THRESHOLD", &mut settings.frame_threshold)?;
        read_env("MINIMUM_NOTE_LENGTH", &mut settings.minimum_note_length)?;
        Ok(settings)
    }

    pub fn chord_window_seconds(&self) -> f64 {
        self.chord_window_ms / 1000.0
    }

    pub fn merge_tolerance_seconds(&self) -> f64 {
        self.merge_tolerance_ms / 1000.0
    }
}

fn read_env<T: std::str::FromStr>(name: &str, slot: &mut T) -> Result<(), TranscribeError> {
    let key = format!("{ENV_PREFIX}{name}");
    match std::env::var(&key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => {
                *slot = value;
                Ok(())
            }
            Err(_) => Err(TranscribeError::BadSetting { key, value: raw }),
        },
        Err(_) => Ok(()),
    }
}
