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
//! A MIDI playback engine for guitar tablature scores.
//!
//! A [`score::Score`] is turned into an ordered list of timed MIDI events, which a
//! [`player::Player`] performs on a [`midi::Device`] in real time while following repeats,
//! alternate endings and musical directions.
pub mod config;
pub mod midi;
pub mod playback;
pub mod player;
pub mod playsync;
pub mod score;
pub mod thread_priority;
pub mod util;

#[cfg(test)]
pub(crate) mod testutil;
