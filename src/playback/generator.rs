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
//! Walks the score and generates the timed MIDI events for every system.
//!
//! Each system is generated in two passes: the metronome clicks for every bar, then the notes
//! for every staff and voice. Each voice keeps its own running start time from the start of
//! the system, and the system lasts as long as its longest voice.
use tracing::warn;

use crate::score::{Note, Score, SystemLocation, NUM_STAFF_VOICES};

use super::{
    duration::{duration_of, measure_duration},
    event::{
        MidiEvent, MidiEventKind, VibratoType, METRONOME_CHANNEL, METRONOME_PITCH, STRONG_ACCENT,
        WEAK_ACCENT,
    },
    pitch::{resolve_pitch, resolve_velocity},
};

/// Delay between the notes of an arpeggio.
pub const ARPEGGIO_OFFSET: f64 = 30.0;

/// The MIDI channel of a staff. The percussion channel is left to the metronome.
pub fn staff_channel(staff: usize) -> u8 {
    let channel = staff.min(14) as u8;
    if channel >= METRONOME_CHANNEL {
        channel + 1
    } else {
        channel
    }
}

/// Generates the events of every system, one list per system, in score order.
pub fn generate_events(score: &Score) -> Vec<Vec<MidiEvent>> {
    let mut timestamp = 0.0;
    (0..score.systems().len() as u32)
        .map(|system_index| {
            let mut events = Vec::new();
            let metronome_end = generate_metronome(score, system_index, timestamp, &mut events);
            let notes_end = generate_events_for_system(score, system_index, timestamp, &mut events);
            timestamp = metronome_end.max(notes_end);
            events
        })
        .collect()
}

/// Generates the metronome clicks for a system: one click per pulse of every bar, accented on
/// the first pulse. Every bar opening and the end bar also get a zero-length release, so
/// playback observes each barline on time even when the clicks are filtered out or the bar
/// opens on a rest. Returns the time at which the last bar ends.
pub fn generate_metronome(
    score: &Score,
    system_index: u32,
    start_time: f64,
    events: &mut Vec<MidiEvent>,
) -> f64 {
    let Some(system) = score.system(system_index) else {
        return start_time;
    };
    let mut start_time = start_time;

    for barline in system.bar_openings() {
        let location = SystemLocation::new(system_index, barline.position);
        let time_signature = score.time_signature_at(location);
        let pulses = time_signature.pulse_count();
        let pulse_duration = measure_duration(score, location) / f64::from(pulses);
        let measures = system.multibar_rest_in_bar(barline.position).unwrap_or(1).max(1);

        events.push(MidiEvent::stop_note(
            METRONOME_CHANNEL,
            start_time,
            location,
            METRONOME_PITCH,
        ));

        for _ in 0..measures {
            for pulse in 0..pulses {
                let velocity = if pulse == 0 { STRONG_ACCENT } else { WEAK_ACCENT };
                events.push(MidiEvent::metronome(
                    start_time,
                    pulse_duration,
                    location,
                    velocity,
                ));
                start_time += pulse_duration;
                events.push(MidiEvent::stop_note(
                    METRONOME_CHANNEL,
                    start_time,
                    location,
                    METRONOME_PITCH,
                ));
            }
        }
    }

    events.push(MidiEvent::stop_note(
        METRONOME_CHANNEL,
        start_time,
        SystemLocation::new(system_index, system.end_bar.position),
        METRONOME_PITCH,
    ));

    start_time
}

/// Generates the note events of every staff and voice in a system. Returns the time at which
/// the longest voice ends.
pub fn generate_events_for_system(
    score: &Score,
    system_index: u32,
    system_start_time: f64,
    events: &mut Vec<MidiEvent>,
) -> f64 {
    let Some(system) = score.system(system_index) else {
        return system_start_time;
    };
    let mut end_time = system_start_time;

    for (staff_index, staff) in system.staves.iter().enumerate() {
        let Some(guitar) = score.guitar(staff_index) else {
            warn!(
                system = system_index,
                staff = staff_index,
                "Staff has no guitar, skipping."
            );
            continue;
        };
        let channel = staff_channel(staff_index);

        for voice in 0..NUM_STAFF_VOICES {
            let mut start_time = system_start_time;
            // Time taken by grace notes from the start of the next note.
            let mut grace_delay = 0.0;

            for (index, position) in staff.positions(voice).iter().enumerate() {
                let location = SystemLocation::new(system_index, position.position);
                let duration = duration_of(score, system_index, system, staff, voice, index);

                if position.rest {
                    start_time += duration;
                    grace_delay = 0.0;
                    end_time = f64::max(end_time, start_time);
                    continue;
                }

                // Grace notes take their time from the note before them. At the start of a
                // system there is none, so they delay the note after them instead.
                let (position_start, position_duration) = if !position.acciaccatura {
                    let timing = (start_time + grace_delay, (duration - grace_delay).max(0.0));
                    grace_delay = 0.0;
                    timing
                } else if start_time - duration >= system_start_time {
                    (start_time - duration, duration)
                } else {
                    let timing = (start_time + grace_delay, duration);
                    grace_delay += duration;
                    timing
                };

                if position.has_vibrato() && !position.notes.is_empty() {
                    let vibrato = if position.vibrato {
                        VibratoType::Normal
                    } else {
                        VibratoType::Wide
                    };
                    events.push(MidiEvent::vibrato_on(
                        channel,
                        position_start,
                        position_duration,
                        location,
                        vibrato,
                    ));
                    events.push(MidiEvent::vibrato_off(
                        channel,
                        position_start + position_duration,
                        location,
                    ));
                }

                let mut notes = position.notes.iter().collect::<Vec<&Note>>();
                if position.arpeggio_down {
                    notes.sort_by_key(|note| note.string);
                } else if position.arpeggio_up {
                    notes.sort_by_key(|note| std::cmp::Reverse(note.string));
                }

                let mut note_start = position_start;
                let mut note_duration = position_duration;
                for note in notes {
                    if position.has_arpeggio() {
                        note_start += ARPEGGIO_OFFSET;
                        note_duration = (note_duration - ARPEGGIO_OFFSET).max(0.0);
                    }

                    let pitch = resolve_pitch(guitar, note);

                    // A tied note continues the one before it.
                    if !note.tied {
                        events.push(MidiEvent::new(
                            channel,
                            note_start,
                            note_duration,
                            location,
                            MidiEventKind::PlayNote {
                                pitch,
                                velocity: resolve_velocity(note),
                                muted: note.muted,
                                preset: guitar.preset,
                            },
                        ));
                    }

                    let tied_to_next_note = note.tie_wrap
                        || staff
                            .next_note_on_string(voice, index, note.string)
                            .is_some_and(|next| next.tied);
                    if !tied_to_next_note {
                        let length = if position.staccato {
                            note_duration / 2.0
                        } else {
                            note_duration
                        };
                        events.push(MidiEvent::stop_note(
                            channel,
                            note_start + length,
                            location,
                            pitch,
                        ));
                    }
                }

                if !position.acciaccatura {
                    start_time += duration;
                }
                end_time = end_time
                    .max(start_time)
                    .max(position_start + position_duration);
            }
        }
    }

    end_time
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use crate::{
        playback::event::DEFAULT_VELOCITY,
        score::{Barline, BarlineKind, Position, Staff, System},
        testutil::{note_score, tied},
    };

    use super::*;

    fn note_events(score: &Score) -> Vec<MidiEvent> {
        let mut events = Vec::new();
        generate_events_for_system(score, 0, 0.0, &mut events);
        events
    }

    fn plays(events: &[MidiEvent]) -> Vec<(f64, u8)> {
        events
            .iter()
            .filter_map(|event| match event.kind {
                MidiEventKind::PlayNote { pitch, .. } => Some((event.start_time, pitch)),
                _ => None,
            })
            .collect()
    }

    fn stops(events: &[MidiEvent]) -> Vec<(f64, u8)> {
        events
            .iter()
            .filter_map(|event| match event.kind {
                MidiEventKind::StopNote { pitch } => Some((event.start_time, pitch)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_simple_melody() {
        let score = note_score(vec![
            Position::new(0, 4, vec![Note::new(0, 0)]),
            Position::new(1, 8, vec![Note::new(0, 2)]),
            Position::rest(2, 8),
            Position::new(3, 4, vec![Note::new(0, 3)]),
        ]);

        let mut events = Vec::new();
        let end = generate_events_for_system(&score, 0, 1000.0, &mut events);

        assert_eq!(
            vec![(1000.0, 64), (1500.0, 66), (2000.0, 67)],
            plays(&events)
        );
        assert_eq!(
            vec![(1500.0, 64), (1750.0, 66), (2500.0, 67)],
            stops(&events)
        );
        assert_eq!(2500.0, end);
        assert!(events.iter().all(|event| event.channel == 0));
        assert!(events.iter().any(|event| matches!(
            event.kind,
            MidiEventKind::PlayNote {
                velocity: DEFAULT_VELOCITY,
                muted: false,
                preset: 25,
                ..
            }
        )));
    }

    #[test]
    fn test_trailing_rest_extends_system() {
        let score = note_score(vec![
            Position::new(0, 4, vec![Note::new(0, 0)]),
            Position::rest(1, 2),
        ]);

        let mut events = Vec::new();
        assert_eq!(
            1500.0,
            generate_events_for_system(&score, 0, 0.0, &mut events)
        );
    }

    #[test]
    fn test_tie_chain_has_one_play_and_one_stop() {
        let score = note_score(vec![
            Position::new(0, 4, vec![Note::new(1, 5)]),
            Position::new(1, 4, vec![tied(1, 5)]),
            Position::new(2, 4, vec![tied(1, 5)]),
            Position::new(3, 4, vec![Note::new(1, 7)]),
        ]);

        let events = note_events(&score);
        assert_eq!(vec![(0.0, 64), (1500.0, 66)], plays(&events));
        assert_eq!(vec![(1500.0, 64), (2000.0, 66)], stops(&events));
    }

    #[test]
    fn test_tie_wrap_leaves_note_sounding() {
        let mut note = Note::new(0, 0);
        note.tie_wrap = true;
        let score = note_score(vec![Position::new(0, 4, vec![note])]);

        let events = note_events(&score);
        assert_eq!(1, plays(&events).len());
        assert!(stops(&events).is_empty());
    }

    #[test]
    fn test_staccato_halves_note() {
        let mut position = Position::new(0, 4, vec![Note::new(0, 0)]);
        position.staccato = true;
        let score = note_score(vec![position, Position::new(1, 4, vec![Note::new(0, 1)])]);

        let events = note_events(&score);
        assert_eq!(vec![(250.0, 64), (1000.0, 65)], stops(&events));
        assert_eq!(vec![(0.0, 64), (500.0, 65)], plays(&events));
    }

    #[test]
    fn test_grace_note_borrows_time() {
        let mut grace = Position::new(1, 16, vec![Note::new(0, 2)]);
        grace.acciaccatura = true;
        let score = note_score(vec![
            Position::new(0, 4, vec![Note::new(0, 0)]),
            grace,
            Position::new(2, 4, vec![Note::new(0, 3)]),
        ]);

        let events = note_events(&score);
        assert_eq!(
            vec![(0.0, 64), (440.0, 66), (500.0, 67)],
            plays(&events)
        );
        assert_eq!(
            vec![(500.0, 64), (500.0, 66), (1000.0, 67)],
            stops(&events)
        );
    }

    #[test]
    fn test_grace_note_at_system_start_delays_next_note() {
        let mut grace = Position::new(0, 16, vec![Note::new(0, 7)]);
        grace.acciaccatura = true;
        let score = note_score(vec![grace, Position::new(1, 4, vec![Note::new(0, 5)])]);

        let mut events = Vec::new();
        let end = generate_events_for_system(&score, 0, 2000.0, &mut events);

        assert!(events.iter().all(|event| event.start_time >= 2000.0));
        assert_eq!(vec![(2000.0, 71), (2060.0, 69)], plays(&events));
        assert_eq!(vec![(2060.0, 71), (2500.0, 69)], stops(&events));
        assert_eq!(2500.0, end);
    }

    #[test]
    fn test_arpeggio_staggers_notes() {
        let mut down = Position::new(
            0,
            4,
            vec![Note::new(2, 0), Note::new(0, 0), Note::new(1, 0)],
        );
        down.arpeggio_down = true;
        let mut up = Position::new(
            1,
            4,
            vec![Note::new(0, 0), Note::new(2, 0), Note::new(1, 0)],
        );
        up.arpeggio_up = true;
        let score = note_score(vec![down, up]);

        let mut events = Vec::new();
        let end = generate_events_for_system(&score, 0, 0.0, &mut events);

        assert_eq!(
            vec![
                (30.0, 64),
                (60.0, 59),
                (90.0, 55),
                (530.0, 55),
                (560.0, 59),
                (590.0, 64)
            ],
            plays(&events)
        );
        // Each note keeps ending at the end of the position.
        assert!(stops(&events)[..3].iter().all(|(time, _)| *time == 500.0));
        assert!(stops(&events)[3..].iter().all(|(time, _)| *time == 1000.0));
        assert_eq!(1000.0, end);
    }

    #[test]
    fn test_vibrato_pairs() {
        let mut position = Position::new(0, 2, vec![Note::new(0, 0), Note::new(1, 0)]);
        position.wide_vibrato = true;
        let score = note_score(vec![position]);

        let events = note_events(&score);
        let vibrato = events
            .iter()
            .filter(|event| {
                matches!(
                    event.kind,
                    MidiEventKind::VibratoOn { .. } | MidiEventKind::VibratoOff
                )
            })
            .collect::<Vec<&MidiEvent>>();

        assert_eq!(2, vibrato.len());
        assert_eq!(
            MidiEventKind::VibratoOn {
                vibrato: VibratoType::Wide
            },
            vibrato[0].kind
        );
        assert_eq!(0.0, vibrato[0].start_time);
        assert_eq!(MidiEventKind::VibratoOff, vibrato[1].kind);
        assert_eq!(1000.0, vibrato[1].start_time);
    }

    #[test]
    fn test_voices_and_staves_take_longest() {
        let score = crate::testutil::score_with_staves(vec![
            Staff::new(vec![
                vec![Position::new(0, 1, vec![Note::new(0, 0)])],
                vec![
                    Position::new(0, 4, vec![Note::new(3, 0)]),
                    Position::new(1, 4, vec![Note::new(3, 2)]),
                ],
            ]),
            Staff::new(vec![vec![Position::new(0, 2, vec![Note::new(5, 0)])]]),
        ]);

        let mut events = Vec::new();
        let end = generate_events_for_system(&score, 0, 0.0, &mut events);
        assert_eq!(2000.0, end);
        assert!(events
            .iter()
            .filter(|event| matches!(event.kind, MidiEventKind::PlayNote { pitch: 40, .. }))
            .all(|event| event.channel == 1));
    }

    #[test]
    fn test_play_stop_closure() {
        let score = note_score(vec![
            Position::new(0, 8, vec![Note::new(0, 0), Note::new(1, 1)]),
            Position::new(1, 8, vec![tied(0, 0), Note::new(1, 3)]),
            Position::new(2, 4, vec![tied(0, 0)]),
            Position::new(3, 4, vec![Note::new(0, 0)]),
        ]);

        let events = note_events(&score);
        let mut open: HashMap<u8, f64> = HashMap::new();
        let mut ordered = events.clone();
        ordered.sort_by(|a, b| a.schedule_cmp(b));
        for event in ordered.iter() {
            match event.kind {
                MidiEventKind::PlayNote { pitch, .. } => {
                    assert!(open.insert(pitch, event.start_time).is_none());
                }
                MidiEventKind::StopNote { pitch } => {
                    let start = open.remove(&pitch).expect("stop without play");
                    assert!(event.start_time >= start);
                }
                _ => {}
            }
        }
        assert!(open.is_empty());
    }

    #[test]
    fn test_metronome() {
        let mut score_system = System::new(
            vec![Barline::new(2, BarlineKind::Bar)
                .with_time_signature(crate::score::TimeSignature::new(3, 4))],
            vec![],
        );
        score_system.end_bar = Barline::new(4, BarlineKind::Bar);
        let score = Score::new(vec![score_system], vec![], vec![]).expect("valid score");

        let mut events = Vec::new();
        let end = generate_metronome(&score, 0, 0.0, &mut events);
        assert_eq!(3500.0, end);

        let clicks = events
            .iter()
            .filter_map(|event| match event.kind {
                MidiEventKind::Metronome { velocity } => {
                    Some((event.start_time, event.position, velocity))
                }
                _ => None,
            })
            .collect::<Vec<(f64, u32, u8)>>();
        assert_eq!(
            vec![
                (0.0, 0, STRONG_ACCENT),
                (500.0, 0, WEAK_ACCENT),
                (1000.0, 0, WEAK_ACCENT),
                (1500.0, 0, WEAK_ACCENT),
                (2000.0, 2, STRONG_ACCENT),
                (2500.0, 2, WEAK_ACCENT),
                (3000.0, 2, WEAK_ACCENT),
            ],
            clicks
        );

        let last = events.last().expect("sentinel event");
        assert_eq!(4, last.position);
        assert_eq!(3500.0, last.start_time);

        // Each bar opening has a release at the moment it starts.
        for (position, time) in [(0, 0.0), (2, 2000.0)] {
            assert!(events.iter().any(|event| {
                event.position == position
                    && event.start_time == time
                    && matches!(event.kind, MidiEventKind::StopNote { .. })
            }));
        }
    }

    #[test]
    fn test_metronome_pulses_and_multibar_rest() {
        let mut rest = Position::rest(0, 1);
        rest.multibar_rest = Some(2);
        let mut system = System::new(vec![], vec![Staff::new(vec![vec![rest]])]);
        system.start_bar = Barline::new(0, BarlineKind::Bar).with_time_signature(
            crate::score::TimeSignature {
                beats_per_measure: 6,
                beat_amount: 8,
                pulses: Some(2),
            },
        );
        let score = Score::new(vec![system], vec![], vec![crate::score::Guitar::default()])
            .expect("valid score");

        let mut events = Vec::new();
        let end = generate_metronome(&score, 0, 0.0, &mut events);
        let clicks = events
            .iter()
            .filter(|event| matches!(event.kind, MidiEventKind::Metronome { .. }))
            .map(|event| event.start_time)
            .collect::<Vec<f64>>();

        assert_eq!(vec![0.0, 750.0, 1500.0, 2250.0], clicks);
        assert_eq!(3000.0, end);
    }

    #[test]
    fn test_generate_events_chains_systems() {
        let score = crate::testutil::two_system_score();
        let systems = generate_events(&score);

        assert_eq!(2, systems.len());
        let second_start = systems[1]
            .iter()
            .map(|event| event.start_time)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(2000.0, second_start);
        assert!(systems[1].iter().all(|event| event.system == 1));
    }

    #[test]
    fn test_staff_channel_skips_percussion() {
        assert_eq!(0, staff_channel(0));
        assert_eq!(8, staff_channel(8));
        assert_eq!(10, staff_channel(9));
        assert_eq!(15, staff_channel(20));
    }
}
