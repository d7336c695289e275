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
//! Tracks repeat bars, alternate endings and musical directions during a playback session and
//! decides where playback continues when one of them is reached.
use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::score::{AlternateEnding, BarlineKind, DirectionSymbol, Score, SystemLocation};

/// A repeat-end barline and the jumps it has left.
#[derive(Debug, Clone, Copy)]
struct RepeatEnd {
    location: SystemLocation,
    /// Where the repeated section starts.
    start: SystemLocation,
    total: u32,
    remaining: u32,
}

impl RepeatEnd {
    /// The pass through the repeated section, counting from one.
    fn pass(&self) -> u32 {
        self.total - self.remaining + 1
    }
}

#[derive(Debug, Clone)]
struct Ending {
    location: SystemLocation,
    ending: AlternateEnding,
    /// Index of the repeat the ending belongs to.
    repeat: Option<usize>,
}

#[derive(Debug, Clone)]
struct DirectionMarker {
    location: SystemLocation,
    symbols: Vec<DirectionSymbol>,
}

/// Locations of the targets that direction jumps go to.
#[derive(Debug, Default, Clone, Copy)]
struct JumpTargets {
    coda: Option<SystemLocation>,
    double_coda: Option<SystemLocation>,
    segno: Option<SystemLocation>,
    segno_segno: Option<SystemLocation>,
}

/// The repeat state of one playback session. Every jump is bounded: repeat bars run out of
/// jumps, each direction is taken at most once and skipped endings only move forward.
#[derive(Debug, Clone)]
pub struct RepeatController {
    repeats: Vec<RepeatEnd>,
    endings: Vec<Ending>,
    directions: Vec<DirectionMarker>,
    /// Double barlines marked fine.
    fines: Vec<SystemLocation>,
    targets: JumpTargets,
    taken: HashSet<(SystemLocation, DirectionSymbol)>,
    active_symbol: Option<DirectionSymbol>,
    start: SystemLocation,
    end: SystemLocation,
}

impl RepeatController {
    pub fn new(score: &Score) -> RepeatController {
        let mut repeat_start = score.start();
        let mut repeats = Vec::new();
        let mut directions = Vec::new();
        let mut fines = Vec::new();
        let mut targets = JumpTargets::default();
        let mut ending_locations = Vec::new();

        for (index, system) in score.systems().iter().enumerate() {
            let system_index = index as u32;
            for barline in system.all_barlines() {
                let location = SystemLocation::new(system_index, barline.position);
                if barline.is_repeat_end() {
                    repeats.push(RepeatEnd {
                        location,
                        start: repeat_start,
                        total: barline.repeat_count,
                        remaining: barline.repeat_count,
                    });
                }
                if barline.is_repeat_start() {
                    repeat_start = location;
                }
                if barline.kind == BarlineKind::DoubleBarFine {
                    fines.push(location);
                }
            }

            for direction in system.directions.iter() {
                let location = SystemLocation::new(system_index, direction.position);
                for symbol in direction.symbols.iter() {
                    let target = match symbol {
                        DirectionSymbol::Coda => &mut targets.coda,
                        DirectionSymbol::DoubleCoda => &mut targets.double_coda,
                        DirectionSymbol::Segno => &mut targets.segno,
                        DirectionSymbol::SegnoSegno => &mut targets.segno_segno,
                        _ => continue,
                    };
                    target.get_or_insert(location);
                }
                directions.push(DirectionMarker {
                    location,
                    symbols: direction.symbols.clone(),
                });
            }

            for ending in system.alternate_endings.iter() {
                ending_locations.push((
                    SystemLocation::new(system_index, ending.position),
                    ending.clone(),
                ));
            }
        }

        let endings = ending_locations
            .into_iter()
            .map(|(location, ending)| Ending {
                location,
                repeat: owning_repeat(&repeats, location),
                ending,
            })
            .collect();

        RepeatController {
            repeats,
            endings,
            directions,
            fines,
            targets,
            taken: HashSet::new(),
            active_symbol: None,
            start: score.start(),
            end: score.end(),
        }
    }

    /// The direction jump in effect, if any.
    pub fn active_symbol(&self) -> Option<DirectionSymbol> {
        self.active_symbol
    }

    /// The pass of the repeat that an alternate ending at the location belongs to.
    pub fn pass_at(&self, location: SystemLocation) -> Option<u32> {
        self.endings
            .iter()
            .find(|ending| ending.location == location)
            .map(|ending| self.ending_pass(ending))
    }

    /// Called whenever playback arrives at a new location. Returns where playback should
    /// continue instead, or None to keep going.
    pub fn check_for_repeat(&mut self, location: SystemLocation) -> Option<SystemLocation> {
        if let Some(repeat) = self
            .repeats
            .iter_mut()
            .find(|repeat| repeat.location == location && repeat.remaining > 0)
        {
            repeat.remaining -= 1;
            info!(
                at = %location,
                to = %repeat.start,
                pass = repeat.pass(),
                "Repeating section."
            );
            return Some(repeat.start);
        }

        if let Some(ending) = self
            .endings
            .iter()
            .find(|ending| ending.location == location)
        {
            let pass = self.ending_pass(ending);
            if !ending.ending.plays_on_pass(pass) {
                let target = self.next_marker_after(location);
                debug!(at = %location, to = %target, pass, "Skipping alternate ending.");
                return Some(target);
            }
        }

        if self.active_symbol.is_some() && self.fines.contains(&location) {
            info!(at = %location, "Reached fine barline.");
            return Some(self.end);
        }

        let symbols = self
            .directions
            .iter()
            .filter(|direction| direction.location == location)
            .flat_map(|direction| direction.symbols.iter().copied())
            .collect::<Vec<DirectionSymbol>>();
        for symbol in symbols {
            if self.taken.contains(&(location, symbol)) {
                continue;
            }
            let Some(target) = self.direction_target(location, symbol) else {
                continue;
            };

            self.taken.insert((location, symbol));
            if is_return_jump(symbol) {
                self.active_symbol = Some(symbol);
            }
            info!(at = %location, to = %target, symbol = ?symbol, "Following direction.");
            return Some(target);
        }

        None
    }

    fn ending_pass(&self, ending: &Ending) -> u32 {
        ending
            .repeat
            .and_then(|index| self.repeats.get(index))
            .map(RepeatEnd::pass)
            .unwrap_or(1)
    }

    /// The nearest alternate ending, direction or repeat-end after the location, or the end of
    /// the score.
    fn next_marker_after(&self, location: SystemLocation) -> SystemLocation {
        self.endings
            .iter()
            .map(|ending| ending.location)
            .chain(self.directions.iter().map(|direction| direction.location))
            .chain(self.repeats.iter().map(|repeat| repeat.location))
            .filter(|marker| *marker > location)
            .min()
            .unwrap_or(self.end)
    }

    fn direction_target(
        &self,
        location: SystemLocation,
        symbol: DirectionSymbol,
    ) -> Option<SystemLocation> {
        use DirectionSymbol::*;

        let target = match (self.active_symbol, symbol) {
            (None, DaCapo | DaCapoAlCoda | DaCapoAlDoubleCoda | DaCapoAlFine) => Some(self.start),
            (None, DalSegno | DalSegnoAlCoda | DalSegnoAlDoubleCoda | DalSegnoAlFine) => {
                self.targets.segno
            }
            (
                None,
                DalSegnoSegno
                | DalSegnoSegnoAlCoda
                | DalSegnoSegnoAlDoubleCoda
                | DalSegnoSegnoAlFine,
            ) => self.targets.segno_segno,
            (Some(_), ToCoda) => self.targets.coda,
            (Some(_), ToDoubleCoda) => self.targets.double_coda,
            (Some(_), Fine) => Some(self.end),
            _ => return None,
        };

        if target.is_none() {
            warn!(at = %location, symbol = ?symbol, "Direction has no target, ignoring.");
        }
        target
    }
}

/// Jumps that send playback back to an earlier point, after which the coda and fine
/// directions take effect.
fn is_return_jump(symbol: DirectionSymbol) -> bool {
    use DirectionSymbol::*;

    matches!(
        symbol,
        DaCapo
            | DalSegno
            | DalSegnoSegno
            | DaCapoAlCoda
            | DaCapoAlDoubleCoda
            | DalSegnoAlCoda
            | DalSegnoAlDoubleCoda
            | DalSegnoSegnoAlCoda
            | DalSegnoSegnoAlDoubleCoda
            | DaCapoAlFine
            | DalSegnoAlFine
            | DalSegnoSegnoAlFine
    )
}

/// The repeat an alternate ending belongs to: the first repeat closing at or after the ending
/// whose section contains it, otherwise the last repeat before it.
fn owning_repeat(repeats: &[RepeatEnd], location: SystemLocation) -> Option<usize> {
    repeats
        .iter()
        .position(|repeat| repeat.location >= location && repeat.start <= location)
        .or_else(|| repeats.iter().rposition(|repeat| repeat.location < location))
}
