use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Standard note values, longest first.
///
/// The sixty-fourth exists only on the tick side (GP5 beats); the markup
/// duration buckets stop at the thirty-second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum NoteValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
}

impl NoteValue {
    /// The conventional numeric name: 1 = whole .. 64 = sixty-fourth.
    pub fn numeric(self) -> u8 {
        match self {
            NoteValue::Whole => 1,
            NoteValue::Half => 2,
            NoteValue::Quarter => 4,
            NoteValue::Eighth => 8,
            NoteValue::Sixteenth => 16,
            NoteValue::ThirtySecond => 32,
            NoteValue::SixtyFourth => 64,
        }
    }

    /// Length in ticks at 960 ticks per quarter note.
    pub fn ticks(self) -> u32 {
        match self {
            NoteValue::Whole => 3840,
            NoteValue::Half => 1920,
            NoteValue::Quarter => 960,
            NoteValue::Eighth => 480,
            NoteValue::Sixteenth => 240,
            NoteValue::ThirtySecond => 120,
            NoteValue::SixtyFourth => 60,
        }
    }

    /// Minimum duration in seconds for the markup buckets; `None` for the
    /// values the markup table does not use.
    fn min_seconds(self) -> Option<f64> {
        match self {
            NoteValue::Whole => Some(1.5),
            NoteValue::Half => Some(0.75),
            NoteValue::Quarter => Some(0.375),
            NoteValue::Eighth => Some(0.1875),
            NoteValue::Sixteenth => Some(0.09),
            NoteValue::ThirtySecond | NoteValue::SixtyFourth => None,
        }
    }
}

/// Buckets a duration in seconds: the first (longest) value whose minimum
/// is met wins; anything shorter is a thirty-second.
pub fn quantize_seconds(seconds: f64) -> NoteValue {
    for value in NoteValue::iter() {
        if let Some(min_seconds) = value.min_seconds() {
            if seconds >= min_seconds {
                return value;
            }
        }
    }
    NoteValue::ThirtySecond
}

/// Nearest standard value for a tick count; ties go to the shorter note.
pub fn quantize_ticks(ticks: u32) -> NoteValue {
    let mut best = NoteValue::SixtyFourth;
    let mut best_diff = u32::MAX;
    for value in NoteValue::iter() {
        let diff = ticks.abs_diff(value.ticks());
        if diff <= best_diff {
            best_diff = diff;
            best = value;
        }
    }
    best
}
