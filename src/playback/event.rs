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
use std::cmp::Ordering;

use midly::{
    live::LiveEvent,
    num::{u4, u7},
    MidiMessage,
};

use crate::score::SystemLocation;

/// General MIDI percussion channel, used for the metronome.
pub const METRONOME_CHANNEL: u8 = 9;
/// Side stick.
pub const METRONOME_PITCH: u8 = 37;
pub const STRONG_ACCENT: u8 = 127;
pub const WEAK_ACCENT: u8 = 80;

pub const DEFAULT_VELOCITY: u8 = 127;
pub const MUTED_VELOCITY: u8 = 60;
pub const GHOST_VELOCITY: u8 = 50;

/// General MIDI electric guitar (muted), used for muted notes.
pub const MUTED_GUITAR_PRESET: u8 = 28;
/// The modulation wheel controller drives vibrato.
pub const MODULATION_CONTROLLER: u8 = 1;
pub const VOLUME_CONTROLLER: u8 = 7;
pub const PAN_CONTROLLER: u8 = 10;
pub const ALL_NOTES_OFF_CONTROLLER: u8 = 123;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VibratoType {
    Normal,
    Wide,
}

impl VibratoType {
    /// The modulation depth for the vibrato.
    pub fn depth(&self) -> u8 {
        match self {
            VibratoType::Normal => 60,
            VibratoType::Wide => 100,
        }
    }
}

/// What a MIDI event does when it is performed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MidiEventKind {
    PlayNote {
        pitch: u8,
        velocity: u8,
        muted: bool,
        /// The program of the guitar the note belongs to.
        preset: u8,
    },
    StopNote {
        pitch: u8,
    },
    VibratoOn {
        vibrato: VibratoType,
    },
    VibratoOff,
    Metronome {
        velocity: u8,
    },
}

impl MidiEventKind {
    /// Orders events sharing a timestamp: notes are released before new ones are struck so a
    /// repeated pitch is never cut off by its own release.
    fn rank(&self) -> u8 {
        match self {
            MidiEventKind::StopNote { .. } => 0,
            MidiEventKind::VibratoOff => 1,
            MidiEventKind::PlayNote { .. } => 2,
            MidiEventKind::VibratoOn { .. } => 3,
            MidiEventKind::Metronome { .. } => 4,
        }
    }
}

/// A timed MIDI event generated from the score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiEvent {
    pub channel: u8,
    /// Milliseconds from the start of the score.
    pub start_time: f64,
    /// Milliseconds the event lasts for.
    pub duration: f64,
    pub system: u32,
    pub position: u32,
    pub kind: MidiEventKind,
}

impl MidiEvent {
    pub fn new(
        channel: u8,
        start_time: f64,
        duration: f64,
        location: SystemLocation,
        kind: MidiEventKind,
    ) -> MidiEvent {
        MidiEvent {
            channel,
            start_time,
            duration,
            system: location.system,
            position: location.position,
            kind,
        }
    }

    pub fn stop_note(channel: u8, start_time: f64, location: SystemLocation, pitch: u8) -> MidiEvent {
        MidiEvent::new(
            channel,
            start_time,
            0.0,
            location,
            MidiEventKind::StopNote { pitch },
        )
    }

    pub fn vibrato_on(
        channel: u8,
        start_time: f64,
        duration: f64,
        location: SystemLocation,
        vibrato: VibratoType,
    ) -> MidiEvent {
        MidiEvent::new(
            channel,
            start_time,
            duration,
            location,
            MidiEventKind::VibratoOn { vibrato },
        )
    }

    pub fn vibrato_off(channel: u8, start_time: f64, location: SystemLocation) -> MidiEvent {
        MidiEvent::new(channel, start_time, 0.0, location, MidiEventKind::VibratoOff)
    }

    pub fn metronome(start_time: f64, duration: f64, location: SystemLocation, velocity: u8) -> MidiEvent {
        MidiEvent::new(
            METRONOME_CHANNEL,
            start_time,
            duration,
            location,
            MidiEventKind::Metronome { velocity },
        )
    }

    pub fn location(&self) -> SystemLocation {
        SystemLocation::new(self.system, self.position)
    }

    /// The note this event starts sounding, as a (channel, pitch) pair.
    pub fn sounding_note(&self) -> Option<(u8, u8)> {
        match self.kind {
            MidiEventKind::PlayNote { pitch, .. } => Some((self.channel, pitch)),
            MidiEventKind::Metronome { .. } => Some((self.channel, METRONOME_PITCH)),
            _ => None,
        }
    }

    /// The note this event releases, as a (channel, pitch) pair.
    pub fn released_note(&self) -> Option<(u8, u8)> {
        match self.kind {
            MidiEventKind::StopNote { pitch } => Some((self.channel, pitch)),
            _ => None,
        }
    }

    /// Playback order: by start time, then by event kind.
    pub fn schedule_cmp(&self, other: &MidiEvent) -> Ordering {
        self.start_time
            .total_cmp(&other.start_time)
            .then_with(|| self.kind.rank().cmp(&other.kind.rank()))
    }

    /// The raw MIDI messages that perform this event.
    pub fn to_live_events(&self) -> Vec<LiveEvent<'static>> {
        let channel = self.channel;
        match self.kind {
            MidiEventKind::PlayNote {
                pitch,
                velocity,
                muted,
                preset,
            } => vec![
                program_change(
                    channel,
                    if muted { MUTED_GUITAR_PRESET } else { preset },
                ),
                note_on(channel, pitch, velocity),
            ],
            MidiEventKind::StopNote { pitch } => vec![note_off(channel, pitch)],
            MidiEventKind::VibratoOn { vibrato } => {
                vec![control_change(channel, MODULATION_CONTROLLER, vibrato.depth())]
            }
            MidiEventKind::VibratoOff => vec![control_change(channel, MODULATION_CONTROLLER, 0)],
            MidiEventKind::Metronome { velocity } => {
                vec![note_on(channel, METRONOME_PITCH, velocity)]
            }
        }
    }
}

fn channel_of(channel: u8) -> u4 {
    u4::new(channel.min(15))
}

fn data_of(value: u8) -> u7 {
    u7::new(value.min(127))
}

pub(crate) fn note_on(channel: u8, key: u8, velocity: u8) -> LiveEvent<'static> {
    LiveEvent::Midi {
        channel: channel_of(channel),
        message: MidiMessage::NoteOn {
            key: data_of(key),
            vel: data_of(velocity),
        },
    }
}

pub(crate) fn note_off(channel: u8, key: u8) -> LiveEvent<'static> {
    LiveEvent::Midi {
        channel: channel_of(channel),
        message: MidiMessage::NoteOff {
            key: data_of(key),
            vel: u7::new(0),
        },
    }
}

pub(crate) fn program_change(channel: u8, program: u8) -> LiveEvent<'static> {
    LiveEvent::Midi {
        channel: channel_of(channel),
        message: MidiMessage::ProgramChange {
            program: data_of(program),
        },
    }
}

pub(crate) fn control_change(channel: u8, controller: u8, value: u8) -> LiveEvent<'static> {
    LiveEvent::Midi {
        channel: channel_of(channel),
        message: MidiMessage::Controller {
            controller: data_of(controller),
            value: data_of(value),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn location() -> SystemLocation {
        SystemLocation::new(0, 0)
    }

    #[test]
    fn test_stop_sorts_before_play_at_same_time() {
        let play = MidiEvent::new(
            0,
            500.0,
            500.0,
            location(),
            MidiEventKind::PlayNote {
                pitch: 64,
                velocity: DEFAULT_VELOCITY,
                muted: false,
                preset: 25,
            },
        );
        let stop = MidiEvent::stop_note(0, 500.0, location(), 64);
        let metronome = MidiEvent::metronome(500.0, 500.0, location(), STRONG_ACCENT);
        let earlier = MidiEvent::metronome(499.0, 500.0, location(), WEAK_ACCENT);

        assert_eq!(Ordering::Less, stop.schedule_cmp(&play));
        assert_eq!(Ordering::Less, play.schedule_cmp(&metronome));
        assert_eq!(Ordering::Less, earlier.schedule_cmp(&stop));
        assert_eq!(Ordering::Equal, stop.schedule_cmp(&stop));
    }

    #[test]
    fn test_live_events() {
        let muted = MidiEvent::new(
            2,
            0.0,
            100.0,
            location(),
            MidiEventKind::PlayNote {
                pitch: 40,
                velocity: MUTED_VELOCITY,
                muted: true,
                preset: 25,
            },
        );
        assert_eq!(
            vec![program_change(2, MUTED_GUITAR_PRESET), note_on(2, 40, MUTED_VELOCITY)],
            muted.to_live_events()
        );

        let vibrato = MidiEvent::vibrato_on(1, 0.0, 100.0, location(), VibratoType::Wide);
        assert_eq!(
            vec![control_change(1, MODULATION_CONTROLLER, 100)],
            vibrato.to_live_events()
        );

        let tick = MidiEvent::metronome(0.0, 100.0, location(), WEAK_ACCENT);
        assert_eq!(
            vec![note_on(METRONOME_CHANNEL, METRONOME_PITCH, WEAK_ACCENT)],
            tick.to_live_events()
        );
        assert_eq!(Some((METRONOME_CHANNEL, METRONOME_PITCH)), tick.sounding_note());
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let mut buf = Vec::new();
        note_on(20, 200, 255)
            .write(&mut buf)
            .expect("event should encode");
        assert_eq!(vec![0x9f, 0x7f, 0x7f], buf);
    }
}
