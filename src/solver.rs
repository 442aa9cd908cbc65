use std::collections::HashSet;

use average::Mean;
use itertools::Itertools;
use log::info;
use ordered_float::OrderedFloat;

use crate::guitar::{Fingering, Guitar};
use crate::note_event::{NoteEvent, TabNote};
use crate::settings::Settings;
use crate::string_number::StringNumber;

/// One `(string, fret)` position per note of a chord, in note order.
pub type ChordAssignment = Vec<Fingering>;

/// Notes whose onsets fall within the chord window of the group's first note.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordGroup {
    pub start_time: f64,
    pub notes: Vec<NoteEvent>,
}

/// Enumeration cap per chord; also bounds the DP lattice width.
pub const MAX_COMBOS: usize = 50;

/// Viterbi-style solver assigning each note a unique string/fret position.
///
/// Costs: squared position jump between consecutive chords, fret stretch
/// and a mild high-fret penalty within a chord, and an optional bias
/// toward a target fret zone.
#[derive(Debug, Clone)]
pub struct TabSolver {
    guitar: Guitar,
    chord_window: f64,
    max_fret_span: u8,
    position_jump_weight: f64,
    stretch_weight: f64,
    high_fret_weight: f64,
    max_combos: usize,
    target_fret: Option<u8>,
}

impl TabSolver {
    pub fn new(guitar: Guitar, settings: &Settings) -> Self {
        TabSolver {
            guitar,
            chord_window: settings.chord_window_seconds(),
            max_fret_span: settings.max_fret_span,
            position_jump_weight: settings.position_jump_weight,
            stretch_weight: settings.stretch_weight,
            high_fret_weight: settings.high_fret_penalty_weight,
            max_combos: MAX_COMBOS,
            target_fret: None,
        }
    }

    /// Prefer positions near this fret when several are feasible.
    pub fn with_target_fret(mut self, target_fret: Option<u8>) -> Self {
        self.target_fret = target_fret;
        self
    }

    pub fn solve(&self, notes: &[NoteEvent]) -> Vec<TabNote> {
        if notes.is_empty() {
            return vec![];
        }

        let chords = self.group_chords(notes);
        info!(
            "Solver: {} notes -> {} chord groups (window={:.0}ms)",
            notes.len(),
            chords.len(),
            self.chord_window * 1000.0
        );

        let all_assignments: Vec<Vec<ChordAssignment>> = chords
            .iter()
            .map(|chord| {
                let assignments = self.generate_assignments(chord);
                if assignments.is_empty() {
                    vec![self.fallback_assignment(chord)]
                } else {
                    assignments
                }
            })
            .collect();

        let path = self.best_path(&all_assignments);

        let mut result: Vec<TabNote> = Vec::new();
        for (chord, assignment) in chords.iter().zip(
            path.iter()
                .enumerate()
                .map(|(i, &j)| &all_assignments[i][j]),
        ) {
            for (note, fingering) in chord.notes.iter().zip(assignment) {
                result.push(TabNote {
                    start_time: note.start_time,
                    end_time: note.end_time,
                    midi_pitch: note.midi_pitch,
                    velocity: note.velocity,
                    string: fingering.string.get(),
                    fret: fingering.fret,
                });
            }
        }
        result.sort_by_key(|note| (OrderedFloat(note.start_time), note.string));

        let fretted: Vec<u8> = result
            .iter()
            .filter(|note| note.fret > 0)
            .map(|note| note.fret)
            .collect();
        if let (Some(min), Some(max)) = (fretted.iter().min(), fretted.iter().max()) {
            let average: Mean = fretted.iter().map(|&fret| fret as f64).collect();
            info!(
                "Solver result: fret range {}-{} (avg {:.1}), target={}",
                min,
                max,
                average.mean(),
                self.target_fret
                    .map_or_else(|| "auto".to_owned(), |target| target.to_string()),
            );
        }

        result
    }

    /// Minimum-cost lattice path: `dp[i][j]` is the cheapest way to reach
    /// assignment `j` of chord `i`. Strict-improvement updates and
    /// first-position argmins make ties deterministic (earliest index wins).
    fn best_path(&self, all_assignments: &[Vec<ChordAssignment>]) -> Vec<usize> {
        let n = all_assignments.len();
        let mut dp: Vec<Vec<f64>> = all_assignments
            .iter()
            .map(|assignments| vec![f64::INFINITY; assignments.len()])
            .collect();
        let mut back: Vec<Vec<usize>> = all_assignments
            .iter()
            .map(|assignments| vec![0; assignments.len()])
            .collect();

        for (j, assignment) in all_assignments[0].iter().enumerate() {
            dp[0][j] = self.internal_cost(assignment) + self.zone_cost(assignment);
        }

        for i in 1..n {
            for (j, curr) in all_assignments[i].iter().enumerate() {
                let curr_internal = self.internal_cost(curr);
                let curr_zone = self.zone_cost(curr);
                for (k, prev) in all_assignments[i - 1].iter().enumerate() {
                    let total = dp[i - 1][k]
                        + self.transition_cost(prev, curr)
                        + curr_internal
                        + curr_zone;
                    if total < dp[i][j] {
                        dp[i][j] = total;
                        back[i][j] = k;
                    }
                }
            }
        }

        let mut path = vec![0usize; n];
        path[n - 1] = dp[n - 1]
            .iter()
            .position_min_by_key(|&&cost| OrderedFloat(cost))
            .unwrap_or(0);
        for i in (0..n - 1).rev() {
            path[i] = back[i + 1][path[i + 1]];
        }
        path
    }

    /// Partitions time-sorted notes into simultaneity groups. The window is
    /// measured from each group's first note.
    fn group_chords(&self, notes: &[NoteEvent]) -> Vec<ChordGroup> {
        let mut sorted = notes.to_vec();
        sorted.sort_by_key(|note| OrderedFloat(note.start_time));

        let mut groups: Vec<ChordGroup> = Vec::new();
        let mut current: Vec<NoteEvent> = vec![sorted[0]];
        for &note in &sorted[1..] {
            if note.start_time - current[0].start_time <= self.chord_window {
                current.push(note);
            } else {
                groups.push(ChordGroup {
                    start_time: current[0].start_time,
                    notes: std::mem::take(&mut current),
                });
                current.push(note);
            }
        }
        groups.push(ChordGroup {
            start_time: current[0].start_time,
            notes: current,
        });
        groups
    }

    /// Enumerates playable assignments for one chord: the Cartesian product
    /// of per-note candidates in lexicographic order, rejecting shared
    /// strings and over-span frettings, capped at `max_combos` acceptances.
    fn generate_assignments(&self, chord: &ChordGroup) -> Vec<ChordAssignment> {
        let per_note_candidates: Vec<Vec<Fingering>> = chord
            .notes
            .iter()
            .map(|note| self.guitar.candidates(note.midi_pitch))
            .collect();
        if per_note_candidates
            .iter()
            .any(|candidates| candidates.is_empty())
        {
            return vec![];
        }

        let mut valid: Vec<ChordAssignment> = Vec::new();
        for combo in per_note_candidates
            .iter()
            .map(|candidates| candidates.iter().copied())
            .multi_cartesian_product()
        {
            if !combo.iter().map(|fingering| fingering.string).all_unique() {
                continue;
            }
            if fret_span(&combo).is_some_and(|span| span > self.max_fret_span) {
                continue;
            }
            valid.push(combo);
            if valid.len() >= self.max_combos {
                break;
            }
        }

        // Keep the best candidates when the cap truncates downstream; the
        // stable sort preserves enumeration order between equal costs.
        if self.target_fret.is_some() {
            valid.sort_by_key(|assignment| OrderedFloat(self.zone_cost(assignment)));
        }

        valid
    }

    /// Best-effort assignment when no valid combination exists (more than
    /// six notes, or every combination violates the span limit).
    fn fallback_assignment(&self, chord: &ChordGroup) -> ChordAssignment {
        let mut used_strings: HashSet<StringNumber> = HashSet::new();
        let mut assignment = ChordAssignment::with_capacity(chord.notes.len());

        for note in &chord.notes {
            let mut candidates = self.guitar.candidates(note.midi_pitch);
            match self.target_fret {
                Some(target) => candidates
                    .sort_by_key(|fingering| (fingering.fret as i16 - target as i16).abs()),
                None => candidates.sort_by_key(|fingering| fingering.fret),
            }

            let chosen = candidates
                .into_iter()
                .find(|fingering| !used_strings.contains(&fingering.string));
            let fingering = match chosen {
                Some(fingering) => {
                    used_strings.insert(fingering.string);
                    fingering
                }
                None => {
                    let (&string, &open_pitch) = self
                        .guitar
                        .tuning
                        .iter()
                        .next()
                        .expect("a guitar has at least one string");
                    Fingering {
                        string,
                        fret: note.midi_pitch.saturating_sub(open_pitch),
                    }
                }
            };
            assignment.push(fingering);
        }

        assignment
    }

    /// Stretch plus high-fret penalty; zero when nothing is fretted.
    fn internal_cost(&self, assignment: &[Fingering]) -> f64 {
        let span = match fret_span(assignment) {
            Some(span) => span,
            None => return 0.0,
        };
        let all_frets: Mean = assignment
            .iter()
            .map(|fingering| fingering.fret as f64)
            .collect();
        span as f64 * self.stretch_weight + all_frets.mean() * self.high_fret_weight
    }

    /// Deviation from the user's target fret zone; zero without a target.
    fn zone_cost(&self, assignment: &[Fingering]) -> f64 {
        let target = match self.target_fret {
            Some(target) => target as f64,
            None => return 0.0,
        };
        const ZONE_WEIGHT: f64 = 2.0;
        const OPEN_STRING_WEIGHT: f64 = 0.3;
        assignment
            .iter()
            .map(|fingering| {
                if fingering.fret > 0 {
                    ZONE_WEIGHT * (fingering.fret as f64 - target).abs()
                } else {
                    target * OPEN_STRING_WEIGHT
                }
            })
            .sum()
    }

    /// Squared jump between hand positions. The square is load-bearing: a
    /// five-fret jump costs 25 times a one-fret jump, which is what keeps
    /// runs of notes anchored to one position.
    fn transition_cost(&self, prev: &[Fingering], curr: &[Fingering]) -> f64 {
        let jump = (fret_position(curr) - fret_position(prev)).abs();
        jump * jump * self.position_jump_weight
    }
}

/// Mean fret over fretted positions; 0.0 for an all-open assignment, since
/// open strings can be played from anywhere.
fn fret_position(assignment: &[Fingering]) -> f64 {
    let fretted: Mean = assignment
        .iter()
        .filter(|fingering| fingering.fret > 0)
        .map(|fingering| fingering.fret as f64)
        .collect();
    if fretted.is_empty() {
        0.0
    } else {
        fretted.mean()
    }
}

/// Difference between the highest and lowest fretted frets; `None` when
/// every position is an open string.
fn fret_span(assignment: &[Fingering]) -> Option<u8> {
    let fretted = assignment
        .iter()
        .filter(|fingering| fingering.fret > 0)
        .map(|fingering| fingering.fret);
    let min = fretted.clone().min()?;
    let max = fretted.max().unwrap_or(min);
    Some(max - min)
}

#[cfg(test)]
mod test_solve {
    use super::*;

    fn make_note(start: f64, end: f64, pitch: u8) -> NoteEvent {
        NoteEvent {
            start_time: start,
            end_time: end,
            midi_pitch: pitch,
            velocity: 0.8,
        }
    }

    fn default_solver() -> TabSolver {
        TabSolver::new(Guitar::default(), &Settings::default())
    }

    #[test]
    fn empty_input() {
        assert_eq!(default_solver().solve(&[]), vec![]);
    }

    #[test]
    fn open_low_e() {
        let result = default_solver().solve(&[make_note(0.0, 0.5, 40)]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].string, 6);
        assert_eq!(result[0].fret, 0);
    }

    #[test]
    fn open_high_e() {
        let result = default_solver().solve(&[make_note(0.0, 0.5, 64)]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].string, 1);
        assert_eq!(result[0].fret, 0);
    }

    #[test]
    fn e_minor_chord_uses_six_strings() {
        let notes: Vec<NoteEvent> = [40, 47, 52, 55, 59, 64]
            .into_iter()
            .map(|pitch| make_note(0.0, 1.0, pitch))
            .collect();
        let result = default_solver().solve(&notes);
        assert_eq!(result.len(), 6);
        let strings: HashSet<u8> = result.iter().map(|note| note.string).collect();
        assert_eq!(strings.len(), 6);
    }

    #[test]
    fn ascending_line_moves_smoothly() {
        let notes = vec![
            make_note(0.0, 0.5, 60),
            make_note(0.5, 1.0, 62),
            make_note(1.0, 1.5, 64),
        ];
        let result = default_solver().solve(&notes);
        assert_eq!(result.len(), 3);
        for pair in result.windows(2) {
            assert!(pair[1].fret.abs_diff(pair[0].fret) <= 5);
        }
    }

    #[test]
    fn preserves_timing_and_pitch() {
        let result = default_solver().solve(&[make_note(1.5, 2.0, 55)]);
        assert_eq!(result[0].start_time, 1.5);
        assert_eq!(result[0].end_time, 2.0);
        assert_eq!(result[0].midi_pitch, 55);
        assert_eq!(result[0].velocity, 0.8);
    }

    #[test]
    fn pitch_consistency() {
        let guitar = Guitar::default();
        let notes = vec![
            make_note(0.0, 0.5, 45),
            make_note(0.6, 1.0, 57),
            make_note(1.2, 1.6, 67),
        ];
        for tab_note in default_solver().solve(&notes) {
            let string = StringNumber::new(tab_note.string).unwrap();
            assert_eq!(
                guitar.open_pitch(string).unwrap() + tab_note.fret,
                tab_note.midi_pitch
            );
        }
    }

    #[test]
    fn target_fret_zone() {
        // A4 can be played at string 1 fret 5 or string 2 fret 10.
        let solver = default_solver().with_target_fret(Some(5));
        let result = solver.solve(&[make_note(0.0, 0.5, 69)]);
        assert_eq!(result.len(), 1);
        assert_eq!((result[0].string, result[0].fret), (1, 5));
    }

    #[test]
    fn target_fret_zone_clusters_a_scale() {
        // D major scale: the average fret should land near the target.
        let solver = default_solver().with_target_fret(Some(7));
        let pitches = [62u8, 64, 66, 67, 69, 71, 73, 74];
        let notes: Vec<NoteEvent> = pitches
            .iter()
            .enumerate()
            .map(|(i, &pitch)| make_note(i as f64 * 0.3, i as f64 * 0.3 + 0.3, pitch))
            .collect();
        let result = solver.solve(&notes);
        assert_eq!(result.len(), 8);
        let average: f64 =
            result.iter().map(|note| note.fret as f64).sum::<f64>() / result.len() as f64;
        assert!((3.0..=11.0).contains(&average), "avg fret {average}");
    }

    #[test]
    fn position_stickiness() {
        // The squared transition cost must pin both D4 notes to one position.
        let notes = vec![
            make_note(0.0, 0.5, 62),
            make_note(0.5, 1.0, 64),
            make_note(1.0, 1.5, 62),
        ];
        let result = default_solver().solve(&notes);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].string, result[2].string);
        assert_eq!(result[0].fret, result[2].fret);
    }

    #[test]
    fn monotone_output_order() {
        let notes = vec![
            make_note(1.0, 1.5, 40),
            make_note(0.0, 0.5, 64),
            make_note(0.0, 0.5, 40),
            make_note(1.0, 1.5, 59),
        ];
        let result = default_solver().solve(&notes);
        for pair in result.windows(2) {
            assert!(
                (pair[0].start_time, pair[0].string) <= (pair[1].start_time, pair[1].string)
            );
        }
    }

    #[test]
    fn oversized_chord_falls_back() {
        // Seven simultaneous notes cannot fit six strings.
        let notes: Vec<NoteEvent> = [40u8, 45, 50, 55, 59, 64, 65]
            .into_iter()
            .map(|pitch| make_note(0.0, 1.0, pitch))
            .collect();
        let result = default_solver().solve(&notes);
        assert_eq!(result.len(), 7);
        for tab_note in &result {
            assert!((1..=6).contains(&tab_note.string));
            assert!(tab_note.fret <= 24);
        }
    }
}
