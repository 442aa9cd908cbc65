use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::duration::quantize_seconds;
use crate::note_event::TabNote;
use crate::settings::Settings;

/// Emits the textual tab markup (alphaTex) for a solved note sequence.
#[derive(Debug, Clone)]
pub struct MarkupEmitter {
    tempo: u32,
    chord_window: f64,
}

impl MarkupEmitter {
    pub fn new(settings: &Settings) -> Self {
        MarkupEmitter {
            tempo: settings.tempo_bpm,
            chord_window: settings.chord_window_seconds(),
        }
    }

    /// Single-line markup: header, a `.` separator, then one token per beat.
    /// Chords render as `(fret.string fret.string).duration`.
    pub fn emit(&self, tab_notes: &[TabNote]) -> String {
        if tab_notes.is_empty() {
            return r"\title 'Guitar Transcription' \tempo 120 . 1 r".to_owned();
        }

        let mut parts = vec![
            r"\title 'Guitar Transcription'".to_owned(),
            format!(r"\tempo {}", self.tempo),
            r"\instrument 25".to_owned(),
            r"\tuning e5 b4 g4 d4 a3 e3".to_owned(),
            ".".to_owned(),
        ];

        for (beat_notes, duration) in self.group_into_beats(tab_notes) {
            let token = match beat_notes.as_slice() {
                [note] => format!("{}.{}.{}", note.fret, note.string, duration),
                notes => {
                    let chord = notes
                        .iter()
                        .map(|note| format!("{}.{}", note.fret, note.string))
                        .join(" ");
                    format!("({chord}).{duration}")
                }
            };
            parts.push(token);
        }

        parts.join(" ")
    }

    /// Re-groups the solved notes into beats with the solver's chord window
    /// and buckets each beat's mean duration. The solver only reorders
    /// within identical timestamps, so this reproduces its partition.
    fn group_into_beats(&self, tab_notes: &[TabNote]) -> Vec<(Vec<TabNote>, u8)> {
        let mut sorted = tab_notes.to_vec();
        sorted.sort_by_key(|note| (OrderedFloat(note.start_time), note.string));

        let mut groups: Vec<(Vec<TabNote>, u8)> = Vec::new();
        let mut current: Vec<TabNote> = vec![sorted[0]];
        for &note in &sorted[1..] {
            if note.start_time - current[0].start_time <= self.chord_window {
                current.push(note);
            } else {
                let duration = beat_duration(&current);
                groups.push((std::mem::take(&mut current), duration));
                current.push(note);
            }
        }
        let duration = beat_duration(&current);
        groups.push((current, duration));
        groups
    }
}

/// Markup duration value for a beat: the bucketed mean of its note durations.
fn beat_duration(notes: &[TabNote]) -> u8 {
    let mean =
        notes.iter().map(TabNote::duration).sum::<f64>() / notes.len() as f64;
    quantize_seconds(mean).numeric()
}

#[cfg(test)]
mod test_emit {
    use super::*;

    fn tab_note(start: f64, end: f64, pitch: u8, string: u8, fret: u8) -> TabNote {
        TabNote {
            start_time: start,
            end_time: end,
            midi_pitch: pitch,
            velocity: 0.8,
            string,
            fret,
        }
    }

    fn default_emitter() -> MarkupEmitter {
        MarkupEmitter::new(&Settings::default())
    }

    #[test]
    fn empty_input_is_a_whole_rest() {
        assert_eq!(
            default_emitter().emit(&[]),
            r"\title 'Guitar Transcription' \tempo 120 . 1 r"
        );
    }

    #[test]
    fn single_note() {
        let notes = vec![tab_note(0.0, 0.5, 64, 1, 0)];
        assert_eq!(
            default_emitter().emit(&notes),
            r"\title 'Guitar Transcription' \tempo 120 \instrument 25 \tuning e5 b4 g4 d4 a3 e3 . 0.1.4"
        );
    }

    #[test]
    fn chord_and_following_note() {
        let notes = vec![
            tab_note(0.0, 1.0, 40, 6, 0),
            tab_note(0.0, 1.0, 47, 5, 2),
            tab_note(1.5, 1.6, 64, 1, 0),
        ];
        assert_eq!(
            default_emitter().emit(&notes),
            r"\title 'Guitar Transcription' \tempo 120 \instrument 25 \tuning e5 b4 g4 d4 a3 e3 . (2.5 0.6).2 0.1.16"
        );
    }

    #[test]
    fn chord_positions_listed_by_ascending_string() {
        let notes = vec![
            tab_note(0.0, 1.0, 47, 5, 2),
            tab_note(0.0, 1.0, 40, 6, 0),
            tab_note(0.0, 1.0, 52, 4, 2),
        ];
        let markup = default_emitter().emit(&notes);
        assert!(markup.ends_with("(2.4 2.5 0.6).2"), "got: {markup}");
    }

    #[test]
    fn configured_tempo_appears_in_header() {
        let mut settings = Settings::default();
        settings.tempo_bpm = 90;
        let emitter = MarkupEmitter::new(&settings);
        let markup = emitter.emit(&[tab_note(0.0, 0.5, 64, 1, 0)]);
        assert!(markup.starts_with(r"\title 'Guitar Transcription' \tempo 90 "));
    }

    #[test]
    fn beat_duration_uses_the_mean() {
        // 0.5s and 1.1s average to 0.8s, which buckets to a half note.
        let notes = vec![
            tab_note(0.0, 0.5, 40, 6, 0),
            tab_note(0.0, 1.1, 47, 5, 2),
        ];
        let markup = default_emitter().emit(&notes);
        assert!(markup.ends_with(").2"), "got: {markup}");
    }
}
