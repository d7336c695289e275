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
//! Turns a score into timed MIDI events and plays them back.
//!
//! Generation walks every system, staff and voice once and produces an absolute timeline in
//! milliseconds. Playback then walks the merged timeline, following repeats and directions.
pub mod duration;
pub mod event;
pub mod generator;
pub mod pitch;
pub mod repeat;
pub mod schedule;
pub mod session;
pub mod tempo;

pub use event::{MidiEvent, MidiEventKind, VibratoType};
pub use repeat::RepeatController;
pub use schedule::schedule;
pub use session::{AccurateTimer, PlaybackNotification, Session, SessionOutcome, Timer};
