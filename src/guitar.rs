use crate::string_number::StringNumber;
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;

pub const NUM_STRINGS: u8 = 6;
pub const MIN_FRET: u8 = 0;
pub const MAX_FRET: u8 = 24;

/// A playable position for one pitch: `open_pitch(string) + fret == pitch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingering {
    pub string: StringNumber,
    pub fret: u8,
}

/// Standard tuning, string 1 (high E4 = 64) down to string 6 (low E2 = 40).
pub fn standard_tuning() -> BTreeMap<StringNumber, u8> {
    [(1, 64), (2, 59), (3, 55), (4, 50), (5, 45), (6, 40)]
        .into_iter()
        .map(|(string, open_pitch)| {
            (
                StringNumber::new(string).expect("standard tuning string numbers are valid"),
                open_pitch,
            )
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Guitar {
    pub tuning: BTreeMap<StringNumber, u8>,
    /// Lowest playable MIDI pitch (lowest open string).
    pub min_midi: u8,
    /// Highest playable MIDI pitch (highest open string + MAX_FRET).
    pub max_midi: u8,
}

impl Guitar {
    pub fn new(tuning: BTreeMap<StringNumber, u8>) -> Result<Self> {
        let min_open = tuning.values().min().copied();
        let max_open = tuning.values().max().copied();
        match (min_open, max_open) {
            (Some(min_open), Some(max_open)) => Ok(Guitar {
                tuning,
                min_midi: min_open,
                max_midi: max_open + MAX_FRET,
            }),
            _ => Err(anyhow!("A guitar must have at least one tuned string.")),
        }
    }

    /// All `(string, fret)` positions that sound `midi_pitch`, in ascending
    /// string-number order.
    pub fn candidates(&self, midi_pitch: u8) -> Vec<Fingering> {
        self.tuning
            .iter()
            .filter_map(|(&string, &open_pitch)| {
                let fret = midi_pitch.checked_sub(open_pitch)?;
                (fret <= MAX_FRET).then_some(Fingering { string, fret })
            })
            .collect()
    }

    pub fn open_pitch(&self, string: StringNumber) -> Option<u8> {
        self.tuning.get(&string).copied()
    }
}

impl Default for Guitar {
    fn default() -> Self {
        Guitar::new(standard_tuning()).expect("standard tuning is non-empty")
    }
}
