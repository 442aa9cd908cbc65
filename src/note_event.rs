use serde::{Deserialize, Serialize};

/// A detected note, as produced by the pitch-detection boundary.
///
/// Times are seconds from the start of the audio; `velocity` is the
/// normalised detection confidence/loudness in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub start_time: f64,
    pub end_time: f64,
    pub midi_pitch: u8,
    pub velocity: f64,
}

impl NoteEvent {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// A note with its solved string/fret assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TabNote {
    pub start_time: f64,
    pub end_time: f64,
    pub midi_pitch: u8,
    pub velocity: f64,
    /// 1 (highest-pitched) to 6 (lowest-pitched).
    pub string: u8,
    /// 0 (open) to 24.
    pub fret: u8,
}

impl TabNote {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

#[cfg(test)]
mod test_note_event {
    use super::*;

    #[test]
    fn duration() {
        let note = NoteEvent {
            start_time: 0.25,
            end_time: 1.0,
            midi_pitch: 64,
            velocity: 0.8,
        };
        assert_eq!(note.duration(), 0.75);
    }

    #[test]
    fn json_round_trip() {
        let note = NoteEvent {
            start_time: 0.0,
            end_time: 0.5,
            midi_pitch: 40,
            velocity: 0.9,
        };
        let json = serde_json::to_string(&note).unwrap();
        let back: NoteEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(note, back);
    }
}
