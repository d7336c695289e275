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
use tracing::debug;

use crate::score::{BeatType, Score, SystemLocation, TempoMarker};

const MILLISECONDS_PER_MINUTE: f64 = 60_000.0;

/// Finds the tempo marker governing a location: the last fixed tempo marker at or before it.
/// Alterations of pace are skipped since gradual tempo changes aren't performed.
pub fn tempo_marker_at(score: &Score, location: SystemLocation) -> Option<&TempoMarker> {
    score
        .tempo_markers()
        .iter()
        .filter(|marker| !marker.alteration_of_pace && marker.location() <= location)
        .max_by_key(|marker| marker.location())
}

/// Converts a tempo into the length of a quarter note in milliseconds.
pub fn quarter_note_duration(beats_per_minute: u32, beat_type: BeatType) -> f64 {
    MILLISECONDS_PER_MINUTE / f64::from(beats_per_minute) * (BeatType::Quarter.quarters() / beat_type.quarters())
}

/// The length of a quarter note in milliseconds at the given location, using the default tempo
/// when no usable marker governs it.
pub fn current_tempo(score: &Score, location: SystemLocation) -> f64 {
    match tempo_marker_at(score, location) {
        Some(marker) if marker.beats_per_minute > 0 => {
            quarter_note_duration(marker.beats_per_minute, marker.beat_type)
        }
        Some(marker) => {
            debug!(
                location = %marker.location(),
                "Ignoring tempo marker without a tempo."
            );
            default_tempo()
        }
        None => default_tempo(),
    }
}

fn default_tempo() -> f64 {
    quarter_note_duration(
        TempoMarker::DEFAULT_BEATS_PER_MINUTE,
        TempoMarker::DEFAULT_BEAT_TYPE,
    )
}

#[cfg(test)]
mod test {
    use crate::score::{System, TempoMarker};

    use super::*;

    fn score(tempo_markers: Vec<TempoMarker>) -> Score {
        Score::new(
            vec![System::default(), System::default(), System::default()],
            tempo_markers,
            vec![],
        )
        .expect("valid score")
    }

    #[test]
    fn test_default_tempo() {
        assert_eq!(500.0, current_tempo(&score(vec![]), SystemLocation::new(1, 3)));
    }

    #[test]
    fn test_beat_types() {
        assert_eq!(1000.0, quarter_note_duration(60, BeatType::Quarter));
        assert_eq!(500.0, quarter_note_duration(60, BeatType::Half));
        assert_eq!(2000.0, quarter_note_duration(60, BeatType::Eighth));
        assert_eq!(400.0, quarter_note_duration(100, BeatType::QuarterDotted));
    }

    #[test]
    fn test_latest_marker_wins() {
        let score = score(vec![
            TempoMarker::new(0, 0, 60, BeatType::Quarter),
            TempoMarker::new(0, 8, 120, BeatType::Quarter),
            TempoMarker::new(1, 2, 240, BeatType::Quarter),
        ]);

        assert_eq!(1000.0, current_tempo(&score, SystemLocation::new(0, 7)));
        assert_eq!(500.0, current_tempo(&score, SystemLocation::new(0, 8)));
        // A marker late in an earlier system still governs the next system.
        assert_eq!(500.0, current_tempo(&score, SystemLocation::new(1, 0)));
        assert_eq!(250.0, current_tempo(&score, SystemLocation::new(2, 0)));
    }

    #[test]
    fn test_alteration_of_pace_is_ignored() {
        let mut ritardando = TempoMarker::new(0, 4, 40, BeatType::Quarter);
        ritardando.alteration_of_pace = true;
        let score = score(vec![TempoMarker::new(0, 0, 60, BeatType::Quarter), ritardando]);

        assert_eq!(1000.0, current_tempo(&score, SystemLocation::new(0, 6)));
    }
}
