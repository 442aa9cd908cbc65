use anyhow::{anyhow, Context, Result};
use guitar_transcriber::settings::Settings;
use guitar_transcriber::{transcribe_notes, TranscriptionInput};
use std::fs;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let notes_path = args
        .next()
        .ok_or_else(|| anyhow!("usage: guitar-transcriber <notes.json> [target-fret]"))?;
    let target_fret = args
        .next()
        .map(|raw| raw.parse::<u8>())
        .transpose()
        .context("target fret must be an integer between 0 and 24")?;

    let settings = Settings::from_env()?;
    let notes = serde_json::from_str(
        &fs::read_to_string(&notes_path).with_context(|| format!("reading {notes_path}"))?,
    )
    .context("notes file must be a JSON array of note events")?;

    let transcription = transcribe_notes(TranscriptionInput { notes, target_fret }, &settings)?;

    println!("{}", transcription.tex);

    let gp5_path = "transcription.gp5";
    fs::write(gp5_path, &transcription.gp5).with_context(|| format!("writing {gp5_path}"))?;
    eprintln!(
        "{} notes transcribed -> {} ({} bytes)",
        transcription.note_count,
        gp5_path,
        transcription.gp5.len()
    );

    Ok(())
}
