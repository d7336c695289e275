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
use crate::score::{Barline, Guitar, Note, Position, Score, Staff, System};

/// A tied note.
pub fn tied(string: u8, fret: u8) -> Note {
    Note {
        tied: true,
        ..Note::new(string, fret)
    }
}

/// A single-system score with one standard-tuned guitar playing the positions in its first
/// voice.
pub fn note_score(positions: Vec<Position>) -> Score {
    note_score_with_barlines(vec![], positions)
}

/// Like `note_score`, with interior barlines.
pub fn note_score_with_barlines(barlines: Vec<Barline>, positions: Vec<Position>) -> Score {
    Score::new(
        vec![System::new(barlines, vec![Staff::new(vec![positions])])],
        vec![],
        vec![Guitar::default()],
    )
    .expect("test score should be valid")
}

/// A single-system score with a standard-tuned guitar for every staff.
pub fn score_with_staves(staves: Vec<Staff>) -> Score {
    let guitars = vec![Guitar::default(); staves.len()];
    Score::new(vec![System::new(vec![], staves)], vec![], guitars)
        .expect("test score should be valid")
}

/// Two systems of one 4/4 bar each.
pub fn two_system_score() -> Score {
    let first = Staff::new(vec![vec![
        Position::new(0, 4, vec![Note::new(0, 0)]),
        Position::new(1, 4, vec![Note::new(0, 2)]),
    ]]);
    let second = Staff::new(vec![vec![Position::new(0, 2, vec![Note::new(1, 0)])]]);

    Score::new(
        vec![System::new(vec![], vec![first]), System::new(vec![], vec![second])],
        vec![],
        vec![Guitar::default()],
    )
    .expect("test score should be valid")
}
