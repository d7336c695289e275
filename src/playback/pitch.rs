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
//! Resolves the MIDI pitch and velocity of a note from its guitar and harmonic annotations.
use tracing::{debug, warn};

use crate::score::{Guitar, Note};

use super::event::{DEFAULT_VELOCITY, GHOST_VELOCITY, MUTED_VELOCITY};

/// The highest MIDI note number.
const MAX_PITCH: i32 = 127;

/// Offset, in frets above the open string, of the natural harmonic played at a fret. The
/// natural harmonic at the 7th fret is an octave and a fifth, 19 frets, above the open string.
/// Frets without a natural harmonic have no offset.
pub fn harmonic_offset(fret: u8) -> u8 {
    match fret {
        3 => 31,
        4 | 9 | 16 | 28 => 28,
        5 | 24 => 24,
        7 | 19 => 19,
        12 => 12,
        _ => 0,
    }
}

/// The octave of a MIDI note, where middle C (60) is in octave 4.
fn octave(pitch: i32) -> i32 {
    pitch / 12 - 1
}

/// Resolves the MIDI pitch of a note played on the given guitar. Natural, tapped and artificial
/// harmonics are applied in that order, each building on the previous result.
pub fn resolve_pitch(guitar: &Guitar, note: &Note) -> u8 {
    let open_string_pitch = match guitar.open_string_pitch(note.string) {
        Some(pitch) => i32::from(pitch),
        None => {
            warn!(
                string = note.string,
                strings = guitar.tuning.len(),
                "Note is on a string the guitar does not have."
            );
            0
        }
    };
    let mut pitch = open_string_pitch + i32::from(note.fret);

    if note.natural_harmonic {
        pitch = open_string_pitch + i32::from(harmonic_offset(note.fret));
    }

    if let Some(tapped_fret) = note.tapped_harmonic {
        let offset = match tapped_fret.checked_sub(note.fret) {
            Some(distance) => harmonic_offset(distance),
            None => {
                debug!(
                    fret = note.fret,
                    tapped_fret, "Tapped harmonic is below the fretted note."
                );
                0
            }
        };
        pitch += i32::from(offset);
    }

    if let Some(harmonic) = note.artificial_harmonic {
        pitch = (octave(pitch) + i32::from(harmonic.octave_diff) + 2) * 12 + i32::from(harmonic.key);
    }

    if !(0..=MAX_PITCH).contains(&pitch) {
        warn!(pitch, "Resolved pitch is outside of the MIDI range, clamping.");
    }
    pitch.clamp(0, MAX_PITCH) as u8
}

/// Resolves the velocity of a note. Ghost notes are the quietest, then muted notes.
pub fn resolve_velocity(note: &Note) -> u8 {
    if note.ghost {
        GHOST_VELOCITY
    } else if note.muted {
        MUTED_VELOCITY
    } else {
        DEFAULT_VELOCITY
    }
}
