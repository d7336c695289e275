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
use crate::score::{Score, Staff, System, SystemLocation};

use super::tempo::current_tempo;

/// Grace notes are played for a fixed time, borrowed from the note before them.
pub const GRACE_NOTE_DURATION: f64 = 60.0;

/// The length in milliseconds of a full measure at the given location, according to the
/// governing time signature and tempo.
pub fn measure_duration(score: &Score, location: SystemLocation) -> f64 {
    let time_signature = score.time_signature_at(location);
    current_tempo(score, location) * 4.0 / f64::from(time_signature.beat_amount)
        * f64::from(time_signature.beats_per_measure)
}

/// The length in milliseconds of the position at `index` in a voice of a staff.
///
/// Multi-bar rests last for their measure count. A whole rest that is alone in its bar fills
/// the bar whatever the time signature; any other whole rest keeps its notated length.
pub fn duration_of(
    score: &Score,
    system_index: u32,
    system: &System,
    staff: &Staff,
    voice: usize,
    index: usize,
) -> f64 {
    let Some(position) = staff.positions(voice).get(index) else {
        return 0.0;
    };
    let location = SystemLocation::new(system_index, position.position);

    if let Some(measures) = position.multibar_rest {
        return measure_duration(score, location) * f64::from(measures.max(1));
    }

    if position.rest
        && position.is_whole()
        && staff.is_only_position_in_bar(system, voice, index)
    {
        return measure_duration(score, location);
    }

    if position.acciaccatura {
        return GRACE_NOTE_DURATION;
    }

    position.notated_duration() * current_tempo(score, location)
}
