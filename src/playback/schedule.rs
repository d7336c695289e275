// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::Arc;

use tracing::debug;

use crate::score::Score;

use super::{
    event::{MidiEvent, MidiEventKind},
    generator::generate_events,
};

/// Flattens the per-system event lists into one list ordered by start time. Events that share
/// a start time keep releases ahead of new notes, and otherwise keep their generation order.
pub fn merge(systems: Vec<Vec<MidiEvent>>) -> Arc<[MidiEvent]> {
    let mut events = systems.into_iter().flatten().collect::<Vec<MidiEvent>>();
    events.sort_by(MidiEvent::schedule_cmp);
    events.into()
}

/// Generates the ordered event schedule for a whole score.
pub fn schedule(score: &Score) -> Arc<[MidiEvent]> {
    let events = merge(generate_events(score));
    debug!(
        events = events.len(),
        length_ms = events.last().map(|event| event.start_time).unwrap_or_default(),
        "Generated schedule."
    );
    events
}

/// Removes the metronome clicks from a schedule. Their releases stay in place so that every
/// barline is still reached on time.
pub fn without_metronome(events: &[MidiEvent]) -> Arc<[MidiEvent]> {
    events
        .iter()
        .filter(|event| !matches!(event.kind, MidiEventKind::Metronome { .. }))
        .copied()
        .collect()
}

#[cfg(test)]
mod test {
    use crate::{
        playback::event::METRONOME_CHANNEL,
        score::{Note, Position, SystemLocation},
        testutil::{note_score, tied},
    };

    use super::*;

    #[test]
    fn test_merge_orders_by_time() {
        let location = SystemLocation::new(0, 0);
        let merged = merge(vec![
            vec![
                MidiEvent::stop_note(0, 500.0, location, 64),
                MidiEvent::metronome(0.0, 500.0, location, 127),
            ],
            vec![MidiEvent::stop_note(0, 250.0, location, 60)],
        ]);

        assert_eq!(
            vec![0.0, 250.0, 500.0],
            merged
                .iter()
                .map(|event| event.start_time)
                .collect::<Vec<f64>>()
        );
    }

    #[test]
    fn test_schedule_is_sorted_and_balanced() {
        let score = note_score(vec![
            Position::new(0, 8, vec![Note::new(0, 0), Note::new(2, 2)]),
            Position::new(1, 8, vec![tied(0, 0)]),
            Position::new(2, 4, vec![Note::new(0, 0)]),
            Position::new(3, 2, vec![Note::new(2, 2)]),
        ]);

        let events = schedule(&score);
        assert!(events
            .windows(2)
            .all(|pair| pair[0].start_time <= pair[1].start_time));

        let mut sounding = Vec::new();
        for event in events.iter() {
            if let Some(note) = event.sounding_note() {
                assert!(!sounding.contains(&note), "note struck twice: {:?}", note);
                sounding.push(note);
            }
            if let Some(note) = event.released_note() {
                if event.channel != METRONOME_CHANNEL {
                    assert!(sounding.contains(&note), "note released twice: {:?}", note);
                }
                sounding.retain(|other| *other != note);
            }
        }
        assert!(sounding.is_empty());
    }

    #[test]
    fn test_release_precedes_restrike() {
        let score = note_score(vec![
            Position::new(0, 4, vec![Note::new(0, 0)]),
            Position::new(1, 4, vec![Note::new(0, 0)]),
        ]);

        let events = schedule(&score);
        let at_500 = events
            .iter()
            .filter(|event| event.start_time == 500.0 && event.channel == 0)
            .map(|event| event.kind)
            .collect::<Vec<MidiEventKind>>();
        assert!(matches!(at_500[0], MidiEventKind::StopNote { pitch: 64 }));
        assert!(matches!(at_500[1], MidiEventKind::PlayNote { pitch: 64, .. }));
    }

    #[test]
    fn test_without_metronome() {
        let score = note_score(vec![Position::new(0, 1, vec![Note::new(0, 0)])]);
        let events = schedule(&score);
        let silent = without_metronome(&events);

        assert!(silent
            .iter()
            .all(|event| !matches!(event.kind, MidiEventKind::Metronome { .. })));
        assert_eq!(
            events.last().map(|event| event.location()),
            silent.last().map(|event| event.location())
        );
        assert_eq!(events.len() - 4, silent.len());
    }
}
