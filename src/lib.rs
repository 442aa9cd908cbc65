use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

pub mod detection;
pub mod duration;
pub mod error;
pub mod gp5;
pub mod gp5_writer;
pub mod guitar;
pub mod markup;
pub mod note_event;
pub mod note_filter;
pub mod settings;
pub mod solver;
pub mod string_number;

use error::TranscribeError;
use gp5::GuitarProBuilder;
use guitar::{Guitar, MAX_FRET};
use markup::MarkupEmitter;
use note_event::{NoteEvent, TabNote};
use note_filter::NoteFilter;
use settings::Settings;
use solver::TabSolver;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionInput {
    pub notes: Vec<NoteEvent>,
    #[serde(default)]
    pub target_fret: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub tex: String,
    pub gp5: Vec<u8>,
    pub note_count: usize,
    pub notes_summary: String,
}

#[wasm_bindgen]
#[cfg(not(tarpaulin_include))]
pub fn wasm_transcribe_notes(input: JsValue) -> Result<JsValue, JsError> {
    let transcription_input: TranscriptionInput = serde_wasm_bindgen::from_value(input)?;

    let transcription = match wrapper_transcribe_notes(transcription_input) {
        Ok(transcription) => transcription,
        Err(e) => return Err(JsError::new(&e.to_string())),
    };

    Ok(serde_wasm_bindgen::to_value(&transcription)?)
}

pub fn wrapper_transcribe_notes(
    input: TranscriptionInput,
) -> Result<Transcription, TranscribeError> {
    transcribe_notes(input, &Settings::default())
}

/// Runs the full pipeline: filter, solve, emit markup and GP5.
pub fn transcribe_notes(
    input: TranscriptionInput,
    settings: &Settings,
) -> Result<Transcription, TranscribeError> {
    let TranscriptionInput { notes, target_fret } = input;

    if notes.is_empty() {
        return Err(TranscribeError::EmptyNotes);
    }
    if let Some(target) = target_fret {
        if target > MAX_FRET {
            return Err(TranscribeError::TargetFretTooHigh(target));
        }
    }

    let guitar = Guitar::default();
    let filtered = NoteFilter::new(&guitar, settings).filter(notes);
    info!("Pipeline: {} notes after filtering", filtered.len());

    let tab_notes = solve(&filtered, target_fret, settings);
    info!("Pipeline: {} notes assigned", tab_notes.len());

    let tex = emit_markup(&tab_notes, settings);
    let gp5 = emit_gp5(&tab_notes, settings)?;
    info!(
        "Pipeline: built tex ({} chars) + GP5 ({} bytes)",
        tex.len(),
        gp5.len()
    );

    let notes_summary = tab_notes
        .iter()
        .take(20)
        .map(|note| format!("s{}f{}({})", note.string, note.fret, note.midi_pitch))
        .join(" ");

    Ok(Transcription {
        tex,
        gp5,
        note_count: tab_notes.len(),
        notes_summary,
    })
}

/// Assigns a string/fret position to every note. Total: chords with no
/// playable assignment receive best-effort fallback positions.
pub fn solve(notes: &[NoteEvent], target_fret: Option<u8>, settings: &Settings) -> Vec<TabNote> {
    TabSolver::new(Guitar::default(), settings)
        .with_target_fret(target_fret)
        .solve(notes)
}

pub fn emit_markup(tab_notes: &[TabNote], settings: &Settings) -> String {
    MarkupEmitter::new(settings).emit(tab_notes)
}

pub fn emit_gp5(tab_notes: &[TabNote], settings: &Settings) -> Result<Vec<u8>, TranscribeError> {
    let song = GuitarProBuilder::new(guitar::standard_tuning(), settings).build(tab_notes);
    gp5_writer::write_song(&song)
}

#[cfg(test)]
mod test_wrapper_transcribe_notes {
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
    fn valid_input() {
        let input = TranscriptionInput {
            notes: vec![
                make_note(0.0, 0.5, 40, 0.8),
                make_note(0.6, 1.1, 47, 0.8),
                make_note(1.2, 1.7, 52, 0.8),
            ],
            target_fret: None,
        };

        let transcription = wrapper_transcribe_notes(input).unwrap();
        assert_eq!(transcription.note_count, 3);
        assert!(transcription
            .tex
            .starts_with(r"\title 'Guitar Transcription' \tempo 120"));
        assert!(transcription.gp5.len() > 100);
        assert_eq!(transcription.notes_summary, "s6f0(40) s5f2(47) s4f2(52)");
    }

    #[test]
    fn empty_input() {
        let input = TranscriptionInput {
            notes: vec![],
            target_fret: None,
        };
        assert_eq!(
            wrapper_transcribe_notes(input).unwrap_err(),
            TranscribeError::EmptyNotes
        );
    }

    #[test]
    fn invalid_target_fret() {
        let input = TranscriptionInput {
            notes: vec![make_note(0.0, 0.5, 64, 0.8)],
            target_fret: Some(30),
        };
        assert_eq!(
            wrapper_transcribe_notes(input).unwrap_err(),
            TranscribeError::TargetFretTooHigh(30)
        );
    }

    #[test]
    fn all_notes_filtered_out_still_produces_output() {
        // Below the minimum velocity: the filter removes everything but the
        // emitters still return valid empty documents.
        let input = TranscriptionInput {
            notes: vec![make_note(0.0, 0.5, 64, 0.1)],
            target_fret: None,
        };
        let transcription = wrapper_transcribe_notes(input).unwrap();
        assert_eq!(transcription.note_count, 0);
        assert_eq!(
            transcription.tex,
            r"\title 'Guitar Transcription' \tempo 120 . 1 r"
        );
        assert!(transcription.gp5.len() > 100);
        assert_eq!(transcription.notes_summary, "");
    }

    #[test]
    fn target_fret_biases_the_result() {
        let input = TranscriptionInput {
            notes: vec![make_note(0.0, 0.5, 69, 0.8)],
            target_fret: Some(5),
        };
        let transcription = wrapper_transcribe_notes(input).unwrap();
        assert_eq!(transcription.notes_summary, "s1f5(69)");
    }

    #[test]
    fn timing_preserved_through_the_pipeline() {
        let notes = vec![
            make_note(0.0, 0.5, 40, 0.8),
            make_note(0.75, 1.0, 64, 0.9),
        ];
        let tab_notes = solve(&notes, None, &Settings::default());
        assert_eq!(tab_notes.len(), 2);
        for (input_note, tab_note) in notes.iter().zip(&tab_notes) {
            assert_eq!(input_note.start_time, tab_note.start_time);
            assert_eq!(input_note.end_time, tab_note.end_time);
            assert_eq!(input_note.midi_pitch, tab_note.midi_pitch);
            assert_eq!(input_note.velocity, tab_note.velocity);
        }
    }
}
