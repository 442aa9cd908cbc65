use thiserror::Error;

/// Errors surfaced at the transcription boundary.
///
/// A chord with no playable assignment is not an error: the solver
/// substitutes a best-effort fallback assignment in-band.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranscribeError {
    #[error("No notes provided.")]
    EmptyNotes,
    #[error("The target fret ({0}) is too high. The maximum is 24.")]
    TargetFretTooHigh(u8),
    #[error("Invalid value '{value}' for setting {key}.")]
    BadSetting { key: String, value: String },
    #[error("Pitch detection failed: {0}")]
    Detection(String),
    #[error("GP5 serialisation failed: {0}")]
    Gp5(String),
}
