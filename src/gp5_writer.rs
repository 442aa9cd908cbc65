//! Guitar Pro 5 (v5.1.0) binary serialisation.
//!
//! Layout: version string, score information, lyrics, RSE master effect,
//! page setup, tempo, key, 64 MIDI channels, musical directions, measure
//! headers, tracks, then measure/beat/note data. Integers are little-endian;
//! strings are length-prefixed and, where the format demands it, padded to a
//! fixed size.

use crate::duration::NoteValue;
use crate::error::TranscribeError;
use crate::gp5::{Beat, Gp5Note, Gp5Song, Gp5Track, Measure};

const VERSION: &str = "FICHIER GUITAR PRO v5.10";

const PAGE_SETUP_STRINGS: [&str; 10] = [
    "%title%",
    "%subtitle%",
    "%artist%",
    "%album%",
    "Words by %words%",
    "Music by %music%",
    "Words & Music by %WORDSMUSIC%",
    "Copyright %copyright%",
    "All Rights Reserved - International Copyright Secured",
    "Page %N%/%P%",
];

/// Serialises a document to GP5 bytes.
pub fn write_song(song: &Gp5Song) -> Result<Vec<u8>, TranscribeError> {
    let mut out = ByteWriter::new();

    out.byte_sized_string(VERSION, 30)?;
    write_info(&mut out, song)?;
    write_lyrics(&mut out);
    write_rse_master_effect(&mut out);
    write_page_setup(&mut out)?;

    out.int_byte_sized_string("")?; // tempo name
    out.int(song.tempo as i32);
    out.bool(false); // hide tempo

    out.signed_byte(0); // key signature root (C)
    out.int(0); // octave

    write_midi_channels(&mut out, &song.track);

    for _ in 0..19 {
        out.short(-1); // musical directions, all unset
    }
    out.int(0); // master reverb

    out.int(song.measure_headers.len() as i32);
    out.int(1); // track count

    for (index, _header) in song.measure_headers.iter().enumerate() {
        write_measure_header(&mut out, index == 0);
    }

    write_track(&mut out, &song.track)?;
    out.placeholder(2);

    for measure in &song.measures {
        write_measure(&mut out, measure);
    }

    Ok(out.into_bytes())
}

fn write_info(out: &mut ByteWriter, song: &Gp5Song) -> Result<(), TranscribeError> {
    out.int_byte_sized_string(&song.title)?;
    for _ in 0..8 {
        // subtitle, artist, album, words, music, copyright, tab, instructions
        out.int_byte_sized_string("")?;
    }
    out.int(0); // notice line count
    Ok(())
}

fn write_lyrics(out: &mut ByteWriter) {
    out.int(0); // lyrics track
    for _ in 0..5 {
        out.int(1); // starting measure
        out.int_sized_string("");
    }
}

fn write_rse_master_effect(out: &mut ByteWriter) {
    out.int(100); // master volume
    out.int(0);
    for _ in 0..11 {
        out.signed_byte(0); // 10 equalizer bands + gain
    }
}

fn write_page_setup(out: &mut ByteWriter) -> Result<(), TranscribeError> {
    out.int(210); // page width (mm)
    out.int(297); // page height
    out.int(10); // left margin
    out.int(10); // right margin
    out.int(15); // top margin
    out.int(10); // bottom margin
    out.int(100); // score size %
    out.short(0x01FF); // header/footer fields, all shown
    for text in PAGE_SETUP_STRINGS {
        out.int_byte_sized_string(text)?;
    }
    Ok(())
}

/// 64 channels (4 ports x 16). The guitar sits on channel 1 with its effect
/// channel on 2; channel 10 is the GM percussion channel.
fn write_midi_channels(out: &mut ByteWriter, track: &Gp5Track) {
    for channel in 0..64 {
        let instrument = if channel == 9 { 0 } else { track.instrument };
        out.int(instrument);
        out.signed_byte(channel_byte(104)); // volume
        out.signed_byte(channel_byte(64)); // balance
        out.signed_byte(0); // chorus
        out.signed_byte(0); // reverb
        out.signed_byte(0); // phaser
        out.signed_byte(0); // tremolo
        out.placeholder(2);
    }
}

/// GP stores channel shorts compressed into single bytes.
fn channel_byte(value: i16) -> i8 {
    ((value >> 3) - 1).clamp(-128, 127) as i8 + 1
}

/// Flag bits: 0x01 numerator, 0x02 denominator, 0x04 repeat open,
/// 0x08 repeat close, 0x10 alternate ending, 0x20 marker, 0x40 key change,
/// 0x80 double bar. Every measure here is a plain 4/4 bar, so only the
/// first carries a time signature.
fn write_measure_header(out: &mut ByteWriter, is_first: bool) {
    if !is_first {
        out.placeholder(1);
    }
    let flags: u8 = if is_first { 0x01 | 0x02 } else { 0x00 };
    out.byte(flags);
    if is_first {
        out.signed_byte(4); // numerator
        out.signed_byte(4); // denominator as duration value
        for _ in 0..4 {
            out.byte(2); // beam groups, eighths by twos
        }
    }
    out.placeholder(1); // no alternate ending
    out.byte(0); // triplet feel: none
}

fn write_track(out: &mut ByteWriter, track: &Gp5Track) -> Result<(), TranscribeError> {
    out.placeholder(1); // first track
    let mut flags1: u8 = 0x08; // visible
    if track.is_percussion {
        flags1 |= 0x01;
    }
    out.byte(flags1);
    out.byte_sized_string(&track.name, 40)?;

    out.int(track.strings.len() as i32);
    for index in 0..7 {
        let open_pitch = track
            .strings
            .get(index)
            .map_or(0, |string| string.open_pitch as i32);
        out.int(open_pitch);
    }

    out.int(1); // MIDI port
    out.int(1); // channel (1-based)
    out.int(2); // effect channel
    out.int(24); // fret count
    out.int(0); // capo
    out.color(255, 0, 0);

    out.short(0x0043); // tablature + notation + diagram list
    out.byte(0); // auto accentuation
    out.byte(0); // MIDI bank
    out.byte(0); // humanize
    out.int(0);
    out.int(0);
    out.int(100);
    out.placeholder(12);

    // RSE instrument block.
    out.int(-1); // instrument
    out.int(1);
    out.int(-1); // sound bank
    out.int(-1); // effect number
    for _ in 0..4 {
        out.signed_byte(0); // 3 equalizer bands + gain
    }
    out.int_byte_sized_string("")?; // effect name
    out.int_byte_sized_string("")?; // effect category
    Ok(())
}

fn write_measure(out: &mut ByteWriter, measure: &Measure) {
    // Voice 1.
    out.int(measure.beats.len() as i32);
    for beat in &measure.beats {
        write_beat(out, beat);
    }
    // Voice 2, always empty.
    out.int(0);
    out.byte(0); // line break: none
}

fn write_beat(out: &mut ByteWriter, beat: &Beat) {
    out.byte(0x00); // plain beat: no dot, chord, text, effects or tuplet
    out.signed_byte(duration_byte(beat.duration));

    let mut string_flags: u8 = 0;
    for note in &beat.notes {
        string_flags |= 1 << (7 - note.string);
    }
    out.byte(string_flags);

    let mut notes = beat.notes.clone();
    notes.sort_by_key(|note| note.string);
    for note in &notes {
        write_note(out, note);
    }

    out.short(0); // beat display flags
}

fn write_note(out: &mut ByteWriter, note: &Gp5Note) {
    out.byte(0x20 | 0x10); // note type and dynamics present
    out.byte(1); // normal note
    out.signed_byte(pack_velocity(note.velocity));
    out.signed_byte(note.value as i8);
    out.byte(0); // secondary flags
}

/// Dynamics byte: GP velocities run 15..127 in steps of 16 (ppp..fff).
fn pack_velocity(velocity: u8) -> i8 {
    ((velocity as i16 + 1) / 16) as i8
}

/// Duration byte: -2 whole .. 4 sixty-fourth (log2 of the value minus 2).
fn duration_byte(value: NoteValue) -> i8 {
    match value {
        NoteValue::Whole => -2,
        NoteValue::Half => -1,
        NoteValue::Quarter => 0,
        NoteValue::Eighth => 1,
        NoteValue::Sixteenth => 2,
        NoteValue::ThirtySecond => 3,
        NoteValue::SixtyFourth => 4,
    }
}

/// Little-endian sink for the GP5 primitives.
struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    fn new() -> Self {
        ByteWriter { buffer: Vec::new() }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn byte(&mut self, value: u8) {
        self.buffer.push(value);
    }

    fn signed_byte(&mut self, value: i8) {
        self.buffer.push(value as u8);
    }

    fn bool(&mut self, value: bool) {
        self.byte(u8::from(value));
    }

    fn short(&mut self, value: i16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn int(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn placeholder(&mut self, count: usize) {
        self.buffer.extend(std::iter::repeat(0u8).take(count));
    }

    fn color(&mut self, r: u8, g: u8, b: u8) {
        self.byte(r);
        self.byte(g);
        self.byte(b);
        self.placeholder(1);
    }

    /// One length byte, then the content padded with zeros to `size` bytes.
    fn byte_sized_string(&mut self, text: &str, size: usize) -> Result<(), TranscribeError> {
        let bytes = text.as_bytes();
        if bytes.len() > size || bytes.len() > u8::MAX as usize {
            return Err(TranscribeError::Gp5(format!(
                "string '{text}' exceeds its {size}-byte field"
            )));
        }
        self.byte(bytes.len() as u8);
        self.buffer.extend_from_slice(bytes);
        self.placeholder(size - bytes.len());
        Ok(())
    }

    /// Total size integer (length + 1), length byte, then the content.
    fn int_byte_sized_string(&mut self, text: &str) -> Result<(), TranscribeError> {
        let bytes = text.as_bytes();
        if bytes.len() > u8::MAX as usize {
            return Err(TranscribeError::Gp5(format!(
                "string '{text}' exceeds 255 bytes"
            )));
        }
        self.int(bytes.len() as i32 + 1);
        self.byte(bytes.len() as u8);
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Length integer, then the content.
    fn int_sized_string(&mut self, text: &str) {
        let bytes = text.as_bytes();
        self.int(bytes.len() as i32);
        self.buffer.extend_from_slice(bytes);
    }
}
