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
use std::path::PathBuf;

use super::SystemLocation;

/// Errors raised while loading or validating a score.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("error reading score {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error parsing score: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("system {system} staff {staff} has no guitar assigned")]
    MissingGuitar { system: usize, staff: usize },
    #[error("system {system} staff {staff}: string {string} does not exist on a {strings} string guitar")]
    InvalidString {
        system: usize,
        staff: usize,
        string: u8,
        strings: usize,
    },
    #[error("system {system} staff {staff} has {voices} voices, at most {max} are supported")]
    TooManyVoices {
        system: usize,
        staff: usize,
        voices: usize,
        max: usize,
    },
    #[error("tempo marker at {location} has a tempo of zero beats per minute")]
    ZeroTempo { location: SystemLocation },
    #[error("system {system}: barline at position {position} must lie between the start and end bars")]
    BarlineOutOfRange { system: usize, position: u32 },
    #[error("time signature {beats_per_measure}/{beat_amount} at {location} is invalid")]
    InvalidTimeSignature {
        location: SystemLocation,
        beats_per_measure: u8,
        beat_amount: u8,
    },
    #[error("alternate ending at {location} uses pass {number}, endings are numbered 1 to 8")]
    InvalidEnding { location: SystemLocation, number: u8 },
    #[error("position at {location} has an invalid duration type {duration_type}")]
    InvalidDuration {
        location: SystemLocation,
        duration_type: u8,
    },
}
