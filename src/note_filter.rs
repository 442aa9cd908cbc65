use log::debug;
use ordered_float::OrderedFloat;

use crate::guitar::Guitar;
use crate::note_event::NoteEvent;
use crate::settings::Settings;

/// Cleans a raw detection stream before solving.
///
/// Pipeline order: range clip, velocity clip, overlap dedup, gap merge,
/// final `(start_time, midi_pitch)` sort. Idempotent on its own output.
#[derive(Debug, Clone)]
pub struct NoteFilter {
    min_midi: u8,
    max_midi: u8,
    minimum_velocity: f64,
    merge_tolerance: f64,
}

impl NoteFilter {
    pub fn new(guitar: &Guitar, settings: &Settings) -> Self {
        NoteFilter {
            min_midi: guitar.min_midi,
            max_midi: guitar.max_midi,
            minimum_velocity: settings.minimum_velocity,
            merge_tolerance: settings.merge_tolerance_seconds(),
        }
    }

    pub fn filter(&self, notes: Vec<NoteEvent>) -> Vec<NoteEvent> {
        let raw_count = notes.len();
        let clipped: Vec<NoteEvent> = notes
            .into_iter()
            .filter(|note| note.midi_pitch >= self.min_midi && note.midi_pitch <= self.max_midi)
            .filter(|note| note.velocity >= self.minimum_velocity)
            .collect();

        let deduplicated = deduplicate(clipped);
        let mut merged = merge_close_notes(deduplicated, self.merge_tolerance);
        merged.sort_by_key(|note| (OrderedFloat(note.start_time), note.midi_pitch));

        debug!(
            "Note filter: {} raw -> {} after range/velocity/dedup/merge",
            raw_count,
            merged.len()
        );
        merged
    }
}

/// Drops same-pitch notes that overlap in time, keeping the longer of each
/// overlapping pair (common with detected harmonics).
fn deduplicate(notes: Vec<NoteEvent>) -> Vec<NoteEvent> {
    if notes.len() <= 1 {
        return notes;
    }

    let mut sorted = notes;
    sorted.sort_by_key(|note| (note.midi_pitch, OrderedFloat(note.start_time)));

    let mut kept: Vec<NoteEvent> = Vec::with_capacity(sorted.len());
    for note in sorted {
        match kept.last_mut() {
            Some(prev) if note.midi_pitch == prev.midi_pitch && note.start_time < prev.end_time => {
                if note.duration() > prev.duration() {
                    *prev = note;
                }
            }
            _ => kept.push(note),
        }
    }
    kept
}

/// Merges consecutive same-pitch notes whose gap is at most `tolerance`
/// seconds. Merging chains, so a run of close notes collapses to one.
fn merge_close_notes(notes: Vec<NoteEvent>, tolerance: f64) -> Vec<NoteEvent> {
    if notes.len() <= 1 || tolerance <= 0.0 {
        return notes;
    }

    let mut sorted = notes;
    sorted.sort_by_key(|note| (note.midi_pitch, OrderedFloat(note.start_time)));

    let mut merged: Vec<NoteEvent> = Vec::with_capacity(sorted.len());
    for note in sorted {
        match merged.last_mut() {
            Some(prev)
                if note.midi_pitch == prev.midi_pitch
                    && note.start_time - prev.end_time <= tolerance =>
            {
                prev.end_time = prev.end_time.max(note.end_time);
                prev.velocity = prev.velocity.max(note.velocity);
            }
            _ => merged.push(note),
        }
    }
    merged
}

#[cfg(test)]
mod test_filter {
    use super::*;

    fn make_note(start: f64, end: f64, pitch: u8, velocity: f64) -> NoteEvent {
        NoteEvent {
            start_time: start,
            end_time: end,
            midi_pitch: pitch,
            velocity,
        }
    }

    fn default_filter() -> NoteFilter {
        NoteFilter::new(&Guitar::default(), &Settings::default())
    }

    #[test]
    fn clips_out_of_range_pitches() {
        let notes = vec![
            make_note(0.0, 0.5, 30, 0.8),
            make_note(0.0, 0.5, 60, 0.8),
            make_note(0.0, 0.5, 100, 0.8),
        ];
        let result = default_filter().filter(notes);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].midi_pitch, 60);
    }

    #[test]
    fn clips_quiet_notes() {
        let notes = vec![
            make_note(0.0, 0.5, 60, 0.39),
            make_note(0.5, 1.0, 60, 0.4),
        ];
        let result = default_filter().filter(notes);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].velocity, 0.4);
    }

    #[test]
    fn sorts_by_start_then_pitch() {
        let notes = vec![
            make_note(1.0, 1.5, 50, 0.8),
            make_note(0.0, 0.5, 60, 0.8),
            make_note(0.0, 0.5, 45, 0.8),
        ];
        let result = default_filter().filter(notes);
        let order: Vec<u8> = result.iter().map(|n| n.midi_pitch).collect();
        assert_eq!(order, vec![45, 60, 50]);
    }

    #[test]
    fn idempotent_on_clean_input() {
        let notes = vec![
            make_note(0.0, 0.5, 45, 0.8),
            make_note(0.6, 1.0, 60, 0.7),
            make_note(1.2, 1.5, 64, 0.9),
        ];
        let filter = default_filter();
        let once = filter.filter(notes);
        let twice = filter.filter(once.clone());
        assert_eq!(once, twice);
    }
}

#[cfg(test)]
mod test_deduplicate {
    use super::*;

    fn make_note(start: f64, end: f64, pitch: u8, velocity: f64) -> NoteEvent {
        NoteEvent {
            start_time: start,
            end_time: end,
            midi_pitch: pitch,
            velocity,
        }
    }

    #[test]
    fn longer_note_survives() {
        let short = make_note(0.0, 0.2, 60, 0.8);
        let long = make_note(0.1, 0.9, 60, 0.8);
        assert_eq!(deduplicate(vec![short, long]), vec![long]);
    }

    #[test]
    fn tie_keeps_the_earlier_note() {
        let first = make_note(0.0, 0.5, 60, 0.8);
        let second = make_note(0.2, 0.7, 60, 0.8);
        assert_eq!(deduplicate(vec![first, second]), vec![first]);
    }

    #[test]
    fn different_pitches_untouched() {
        let a = make_note(0.0, 0.5, 60, 0.8);
        let b = make_note(0.1, 0.6, 62, 0.8);
        assert_eq!(deduplicate(vec![a, b]), vec![a, b]);
    }
}

#[cfg(test)]
mod test_merge_close_notes {
    use super::*;

    fn make_note(start: f64, end: f64, pitch: u8, velocity: f64) -> NoteEvent {
        NoteEvent {
            start_time: start,
            end_time: end,
            midi_pitch: pitch,
            velocity,
        }
    }

    #[test]
    fn merges_within_tolerance() {
        let notes = vec![
            make_note(0.0, 0.5, 60, 0.7),
            make_note(0.52, 1.0, 60, 0.9),
        ];
        let result = merge_close_notes(notes, 0.03);
        assert_eq!(result, vec![make_note(0.0, 1.0, 60, 0.9)]);
    }

    #[test]
    fn gap_above_tolerance_kept_apart() {
        let notes = vec![
            make_note(0.0, 0.5, 60, 0.7),
            make_note(0.55, 1.0, 60, 0.9),
        ];
        let result = merge_close_notes(notes.clone(), 0.03);
        assert_eq!(result, notes);
    }

    #[test]
    fn merge_chains_across_three_notes() {
        let notes = vec![
            make_note(0.0, 0.5, 60, 0.7),
            make_note(0.51, 1.0, 60, 0.8),
            make_note(1.02, 1.5, 60, 0.6),
        ];
        let result = merge_close_notes(notes, 0.03);
        assert_eq!(result, vec![make_note(0.0, 1.5, 60, 0.8)]);
    }
}
