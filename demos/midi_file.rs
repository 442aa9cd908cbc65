use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use guitar_transcriber::note_event::NoteEvent;
use guitar_transcriber::{wrapper_transcribe_notes, TranscriptionInput};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

/// Transcribe the first track of a Standard MIDI File.
///
///     cargo run --example midi_file -- song.mid [target-fret]
fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let midi_path = args
        .next()
        .ok_or_else(|| anyhow!("usage: midi_file <song.mid> [target-fret]"))?;
    let target_fret = args
        .next()
        .map(|raw| raw.parse::<u8>())
        .transpose()
        .context("target fret must be an integer between 0 and 24")?;

    let bytes = std::fs::read(&midi_path).with_context(|| format!("reading {midi_path}"))?;
    let smf = Smf::parse(&bytes).context("parsing MIDI file")?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int() as f64,
        Timing::Timecode(..) => return Err(anyhow!("SMPTE-timed MIDI files are not supported")),
    };

    let notes = collect_notes(&smf, ticks_per_quarter);
    if notes.is_empty() {
        return Err(anyhow!("no notes found in {midi_path}"));
    }

    let transcription = wrapper_transcribe_notes(TranscriptionInput { notes, target_fret })?;
    println!("{}", transcription.tex);
    eprintln!("{} notes: {}", transcription.note_count, transcription.notes_summary);

    Ok(())
}

/// Pairs note-on and note-off events into timed `NoteEvent`s, honouring
/// tempo changes as they appear.
fn collect_notes(smf: &Smf, ticks_per_quarter: f64) -> Vec<NoteEvent> {
    const DEFAULT_TEMPO_MPQ: f64 = 500_000.0;

    let mut notes: Vec<NoteEvent> = Vec::new();
    let mut open_notes: HashMap<u8, (f64, f64)> = HashMap::new();
    let mut seconds_per_tick = DEFAULT_TEMPO_MPQ / 1_000_000.0 / ticks_per_quarter;

    for track in &smf.tracks {
        let mut now = 0.0;
        for event in track {
            now += event.delta.as_int() as f64 * seconds_per_tick;
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(mpq)) => {
                    seconds_per_tick = mpq.as_int() as f64 / 1_000_000.0 / ticks_per_quarter;
                }
                TrackEventKind::Midi { message, .. } => match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        open_notes.insert(key.as_int(), (now, vel.as_int() as f64 / 127.0));
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        if let Some((start, velocity)) = open_notes.remove(&key.as_int()) {
                            notes.push(NoteEvent {
                                start_time: start,
                                end_time: now.max(start + 0.05),
                                midi_pitch: key.as_int(),
                                velocity,
                            });
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        // Only the first track with notes is transcribed.
        if !notes.is_empty() {
            break;
        }
    }

    notes
}
