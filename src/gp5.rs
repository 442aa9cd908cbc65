use std::collections::BTreeMap;

use log::debug;

use crate::duration::{quantize_ticks, NoteValue};
use crate::note_event::TabNote;
use crate::settings::Settings;
use crate::string_number::StringNumber;

/// Start ticks within this distance of a beat's head join that beat.
const BEAT_GROUP_TOLERANCE: u64 = 30;
/// Shortest representable note length in ticks (a sixty-fourth).
const MIN_DURATION_TICKS: u64 = 60;

/// In-memory GP5 document, shaped after the wire format:
/// song -> track -> measure -> voice -> beat -> note.
#[derive(Debug, Clone, PartialEq)]
pub struct Gp5Song {
    pub title: String,
    pub tempo: u32,
    pub track: Gp5Track,
    pub measure_headers: Vec<MeasureHeader>,
    /// One measure per header; this crate writes a single track.
    pub measures: Vec<Measure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gp5Track {
    pub name: String,
    /// General MIDI program number.
    pub instrument: i32,
    pub is_percussion: bool,
    /// Stored string 1 (highest pitch) first, as the wire format expects.
    pub strings: Vec<GuitarString>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuitarString {
    pub number: u8,
    pub open_pitch: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasureHeader {
    pub numerator: u8,
    pub denominator: u8,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Measure {
    /// Voice 1 only; the second GP5 voice is always written empty.
    pub beats: Vec<Beat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Beat {
    pub duration: NoteValue,
    pub notes: Vec<Gp5Note>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gp5Note {
    pub string: u8,
    /// Fret number.
    pub value: u8,
    /// MIDI velocity 0..=127.
    pub velocity: u8,
}

/// Builds a GP5 document from solved notes.
///
/// Beats land in voice 1 of their measure without enforcing the 4/4 tick
/// budget; an overfull measure is accepted by the readers this targets.
#[derive(Debug, Clone)]
pub struct GuitarProBuilder {
    tempo: u32,
    ticks_per_beat: u32,
    ticks_per_second: f64,
    tuning: BTreeMap<StringNumber, u8>,
}

impl GuitarProBuilder {
    pub fn new(tuning: BTreeMap<StringNumber, u8>, settings: &Settings) -> Self {
        GuitarProBuilder {
            tempo: settings.tempo_bpm,
            ticks_per_beat: settings.ticks_per_beat,
            ticks_per_second: (settings.tempo_bpm * settings.ticks_per_beat) as f64 / 60.0,
            tuning,
        }
    }

    pub fn build(&self, tab_notes: &[TabNote]) -> Gp5Song {
        let mut song = Gp5Song {
            title: "Guitar Transcription".to_owned(),
            tempo: self.tempo,
            track: self.guitar_track(),
            measure_headers: vec![MeasureHeader {
                numerator: 4,
                denominator: 4,
            }],
            measures: vec![Measure::default()],
        };

        if tab_notes.is_empty() {
            return song;
        }

        let mut tick_notes: Vec<(u64, u64, TabNote)> = tab_notes
            .iter()
            .map(|&note| {
                let start_tick = (note.start_time * self.ticks_per_second) as u64;
                let end_tick = (note.end_time * self.ticks_per_second) as u64;
                let duration_ticks = (end_tick.saturating_sub(start_tick)).max(MIN_DURATION_TICKS);
                (start_tick, duration_ticks, note)
            })
            .collect();
        tick_notes.sort_by_key(|&(start_tick, _, _)| start_tick);

        let ticks_per_measure = (self.ticks_per_beat * 4) as u64;
        let total_ticks = tick_notes
            .iter()
            .map(|&(start_tick, duration_ticks, _)| start_tick + duration_ticks)
            .max()
            .unwrap_or(0);
        let num_measures = (total_ticks.div_ceil(ticks_per_measure)).max(1) as usize;
        song.measure_headers = vec![
            MeasureHeader {
                numerator: 4,
                denominator: 4,
            };
            num_measures
        ];
        song.measures = vec![Measure::default(); num_measures];

        for (beat_start, beat_notes) in group_into_beats(&tick_notes) {
            let measure_index =
                ((beat_start / ticks_per_measure) as usize).min(num_measures - 1);

            let (_, first_duration, _) = beat_notes[0];
            let beat = Beat {
                duration: quantize_ticks(
                    u32::try_from(first_duration).unwrap_or(u32::MAX),
                ),
                notes: beat_notes
                    .iter()
                    .map(|&(_, _, tab_note)| Gp5Note {
                        string: tab_note.string,
                        value: tab_note.fret,
                        velocity: scale_velocity(tab_note.velocity),
                    })
                    .collect(),
            };
            song.measures[measure_index].beats.push(beat);
        }

        debug!(
            "GP5 build: {} notes -> {} measures ({} ticks total)",
            tab_notes.len(),
            num_measures,
            total_ticks
        );
        song
    }

    fn guitar_track(&self) -> Gp5Track {
        Gp5Track {
            name: "Guitar".to_owned(),
            instrument: 25, // Acoustic Guitar (steel)
            is_percussion: false,
            strings: self
                .tuning
                .iter()
                .map(|(&string, &open_pitch)| GuitarString {
                    number: string.get(),
                    open_pitch,
                })
                .collect(),
        }
    }
}

/// Groups notes whose start ticks sit within the tolerance of the group
/// head. Input must be sorted by start tick.
fn group_into_beats(tick_notes: &[(u64, u64, TabNote)]) -> Vec<(u64, Vec<(u64, u64, TabNote)>)> {
    let mut groups: Vec<(u64, Vec<(u64, u64, TabNote)>)> = Vec::new();
    let mut current_start = tick_notes[0].0;
    let mut current: Vec<(u64, u64, TabNote)> = vec![tick_notes[0]];

    for &tick_note in &tick_notes[1..] {
        if tick_note.0.abs_diff(current_start) <= BEAT_GROUP_TOLERANCE {
            current.push(tick_note);
        } else {
            groups.push((current_start, std::mem::take(&mut current)));
            current_start = tick_note.0;
            current.push(tick_note);
        }
    }
    groups.push((current_start, current));
    groups
}

fn scale_velocity(velocity: f64) -> u8 {
    (velocity * 127.0).round().clamp(0.0, 127.0) as u8
}
