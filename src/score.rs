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
//! The read-only score model the playback engine walks.
//!
//! A score is a list of systems. Each system has staves (one per guitar), each staff holds
//! up to two voices of positions, and each position holds the notes struck at that point.
//! Position indices are shared by every staff in a system, and barlines are addressed by the
//! position index they precede.
use std::{fmt, fs, path::Path};

use serde::Deserialize;

mod error;

pub use error::ScoreError;

/// The number of voices each staff can hold.
pub const NUM_STAFF_VOICES: usize = 2;

/// The highest alternate ending number.
pub const MAX_ALTERNATE_ENDING: u8 = 8;

/// A point in the score, addressed by system index and position index. Locations order
/// lexicographically, system first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SystemLocation {
    pub system: u32,
    pub position: u32,
}

impl SystemLocation {
    pub fn new(system: u32, position: u32) -> SystemLocation {
        SystemLocation { system, position }
    }
}

impl fmt::Display for SystemLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.system, self.position)
    }
}

/// The note value a tempo marker counts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatType {
    Half,
    HalfDotted,
    #[default]
    Quarter,
    QuarterDotted,
    Eighth,
    EighthDotted,
    Sixteenth,
    SixteenthDotted,
    ThirtySecond,
    ThirtySecondDotted,
}

impl BeatType {
    /// The length of the beat, measured in quarter notes.
    pub fn quarters(&self) -> f64 {
        match self {
            BeatType::Half => 2.0,
            BeatType::HalfDotted => 3.0,
            BeatType::Quarter => 1.0,
            BeatType::QuarterDotted => 1.5,
            BeatType::Eighth => 0.5,
            BeatType::EighthDotted => 0.75,
            BeatType::Sixteenth => 0.25,
            BeatType::SixteenthDotted => 0.375,
            BeatType::ThirtySecond => 0.125,
            BeatType::ThirtySecondDotted => 0.1875,
        }
    }
}

/// A tempo marker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TempoMarker {
    pub system: u32,
    pub position: u32,
    pub beats_per_minute: u32,
    #[serde(default)]
    pub beat_type: BeatType,
    /// Marks a gradual change of pace (accelerando, ritardando) rather than a fixed tempo.
    #[serde(default)]
    pub alteration_of_pace: bool,
}

impl TempoMarker {
    pub const DEFAULT_BEATS_PER_MINUTE: u32 = 120;
    pub const DEFAULT_BEAT_TYPE: BeatType = BeatType::Quarter;

    pub fn new(system: u32, position: u32, beats_per_minute: u32, beat_type: BeatType) -> TempoMarker {
        TempoMarker {
            system,
            position,
            beats_per_minute,
            beat_type,
            alteration_of_pace: false,
        }
    }

    pub fn location(&self) -> SystemLocation {
        SystemLocation::new(self.system, self.position)
    }
}

/// A guitar: its tuning, capo and the General MIDI settings of its channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Guitar {
    /// Open string pitches as MIDI note numbers, highest string first.
    pub tuning: Vec<u8>,
    #[serde(default)]
    pub capo: u8,
    #[serde(default = "default_preset")]
    pub preset: u8,
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default = "default_pan")]
    pub pan: u8,
}

fn default_preset() -> u8 {
    Guitar::DEFAULT_PRESET
}

fn default_volume() -> u8 {
    Guitar::DEFAULT_VOLUME
}

fn default_pan() -> u8 {
    Guitar::DEFAULT_PAN
}

impl Guitar {
    /// General MIDI steel string acoustic guitar.
    pub const DEFAULT_PRESET: u8 = 25;
    pub const DEFAULT_VOLUME: u8 = 104;
    pub const DEFAULT_PAN: u8 = 64;

    /// The pitch of an open string including the capo, if the string exists.
    pub fn open_string_pitch(&self, string: u8) -> Option<u8> {
        self.tuning
            .get(usize::from(string))
            .map(|pitch| pitch.saturating_add(self.capo))
    }
}

impl Default for Guitar {
    fn default() -> Self {
        Guitar {
            tuning: vec![64, 59, 55, 50, 45, 40],
            capo: 0,
            preset: Guitar::DEFAULT_PRESET,
            volume: Guitar::DEFAULT_VOLUME,
            pan: Guitar::DEFAULT_PAN,
        }
    }
}

/// Time signature of a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimeSignature {
    pub beats_per_measure: u8,
    pub beat_amount: u8,
    /// Metronome pulses per measure. Defaults to one per beat.
    #[serde(default)]
    pub pulses: Option<u8>,
}

impl TimeSignature {
    pub fn new(beats_per_measure: u8, beat_amount: u8) -> TimeSignature {
        TimeSignature {
            beats_per_measure,
            beat_amount,
            pulses: None,
        }
    }

    pub fn pulse_count(&self) -> u8 {
        self.pulses.unwrap_or(self.beats_per_measure).max(1)
    }

    fn is_valid(&self) -> bool {
        self.beats_per_measure > 0 && matches!(self.beat_amount, 1 | 2 | 4 | 8 | 16 | 32)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature::new(4, 4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarlineKind {
    #[default]
    Bar,
    DoubleBar,
    FreeTime,
    RepeatStart,
    RepeatEnd,
    DoubleBarFine,
}

/// A barline, placed before the position index it carries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Barline {
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub kind: BarlineKind,
    /// How many times a repeat end sends playback back to its repeat start.
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
    /// Set when the time signature changes at this barline.
    #[serde(default)]
    pub time_signature: Option<TimeSignature>,
}

fn default_repeat_count() -> u32 {
    1
}

impl Barline {
    pub fn new(position: u32, kind: BarlineKind) -> Barline {
        Barline {
            position,
            kind,
            repeat_count: default_repeat_count(),
            time_signature: None,
        }
    }

    pub fn repeat_end(position: u32, repeat_count: u32) -> Barline {
        Barline {
            repeat_count,
            ..Barline::new(position, BarlineKind::RepeatEnd)
        }
    }

    pub fn with_time_signature(mut self, time_signature: TimeSignature) -> Barline {
        self.time_signature = Some(time_signature);
        self
    }

    pub fn is_repeat_start(&self) -> bool {
        self.kind == BarlineKind::RepeatStart
    }

    pub fn is_repeat_end(&self) -> bool {
        self.kind == BarlineKind::RepeatEnd
    }
}

impl Default for Barline {
    fn default() -> Self {
        Barline::new(0, BarlineKind::Bar)
    }
}

/// Musical directions: jump targets (codas, segnos) and the jumps that use them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionSymbol {
    Coda,
    DoubleCoda,
    Segno,
    SegnoSegno,
    Fine,
    DaCapo,
    DalSegno,
    DalSegnoSegno,
    ToCoda,
    ToDoubleCoda,
    DaCapoAlCoda,
    DaCapoAlDoubleCoda,
    DalSegnoAlCoda,
    DalSegnoAlDoubleCoda,
    DalSegnoSegnoAlCoda,
    DalSegnoSegnoAlDoubleCoda,
    DaCapoAlFine,
    DalSegnoAlFine,
    DalSegnoSegnoAlFine,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Direction {
    pub position: u32,
    pub symbols: Vec<DirectionSymbol>,
}

/// An alternate ending (volta bracket), played only on the listed passes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlternateEnding {
    pub position: u32,
    pub numbers: Vec<u8>,
}

impl AlternateEnding {
    pub fn plays_on_pass(&self, pass: u32) -> bool {
        self.numbers.iter().any(|number| u32::from(*number) == pass)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IrregularGrouping {
    pub notes_played: u8,
    pub played_over: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ArtificialHarmonic {
    /// Pitch class of the harmonic, 0 (C) to 11 (B).
    pub key: u8,
    #[serde(default)]
    pub key_variation: u8,
    /// 0 for loco, 1 for 8va, 2 for 15ma.
    #[serde(default)]
    pub octave_diff: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Note {
    pub string: u8,
    pub fret: u8,
    /// Continues the note on the same string at the previous position.
    pub tied: bool,
    /// Continues into the first position of the next system.
    pub tie_wrap: bool,
    pub muted: bool,
    pub ghost: bool,
    pub natural_harmonic: bool,
    pub tapped_harmonic: Option<u8>,
    pub artificial_harmonic: Option<ArtificialHarmonic>,
}

impl Note {
    pub fn new(string: u8, fret: u8) -> Note {
        Note {
            string,
            fret,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Position {
    pub position: u32,
    /// 1 for a whole note, 2 for a half note, and so on down to 64.
    pub duration_type: u8,
    pub dotted: bool,
    pub double_dotted: bool,
    pub irregular_grouping: Option<IrregularGrouping>,
    pub rest: bool,
    pub acciaccatura: bool,
    pub staccato: bool,
    pub arpeggio_up: bool,
    pub arpeggio_down: bool,
    pub vibrato: bool,
    pub wide_vibrato: bool,
    /// Number of measures covered by a multi-bar rest.
    pub multibar_rest: Option<u8>,
    pub notes: Vec<Note>,
}

impl Position {
    pub fn new(position: u32, duration_type: u8, notes: Vec<Note>) -> Position {
        Position {
            position,
            duration_type,
            notes,
            ..Default::default()
        }
    }

    pub fn rest(position: u32, duration_type: u8) -> Position {
        Position {
            rest: true,
            ..Position::new(position, duration_type, Vec::new())
        }
    }

    /// The notated length of the position, measured in quarter notes.
    pub fn notated_duration(&self) -> f64 {
        let mut duration = 4.0 / f64::from(self.duration_type.max(1));
        if self.dotted {
            duration *= 1.5;
        } else if self.double_dotted {
            duration *= 1.75;
        }
        if let Some(grouping) = self.irregular_grouping {
            if grouping.notes_played > 0 {
                duration *= f64::from(grouping.played_over) / f64::from(grouping.notes_played);
            }
        }
        duration
    }

    pub fn is_whole(&self) -> bool {
        self.duration_type == 1
    }

    pub fn has_arpeggio(&self) -> bool {
        self.arpeggio_up || self.arpeggio_down
    }

    pub fn has_vibrato(&self) -> bool {
        self.vibrato || self.wide_vibrato
    }

    pub fn note_on_string(&self, string: u8) -> Option<&Note> {
        self.notes.iter().find(|note| note.string == string)
    }
}

impl Default for Position {
    fn default() -> Self {
        Position {
            position: 0,
            duration_type: 4,
            dotted: false,
            double_dotted: false,
            irregular_grouping: None,
            rest: false,
            acciaccatura: false,
            staccato: false,
            arpeggio_up: false,
            arpeggio_down: false,
            vibrato: false,
            wide_vibrato: false,
            multibar_rest: None,
            notes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Staff {
    pub voices: Vec<Vec<Position>>,
}

impl Staff {
    pub fn new(voices: Vec<Vec<Position>>) -> Staff {
        Staff { voices }
    }

    /// The positions of a voice, ordered by position index.
    pub fn positions(&self, voice: usize) -> &[Position] {
        self.voices.get(voice).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the note on the same string at the position following `index` in the voice.
    pub fn next_note_on_string(&self, voice: usize, index: usize, string: u8) -> Option<&Note> {
        self.positions(voice)
            .get(index + 1)
            .and_then(|position| position.note_on_string(string))
    }

    /// Returns true if the position at `index` is the only one of its voice inside its bar.
    pub fn is_only_position_in_bar(&self, system: &System, voice: usize, index: usize) -> bool {
        let positions = self.positions(voice);
        let Some(position) = positions.get(index) else {
            return false;
        };

        let bar_start = system.preceding_barline(position.position).position;
        let bar_end = system.next_barline(position.position).position;
        positions
            .iter()
            .filter(|other| other.position >= bar_start && other.position < bar_end)
            .count()
            == 1
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct System {
    pub start_bar: Barline,
    /// Barlines between the start and end bars.
    pub barlines: Vec<Barline>,
    /// Derived from the positions when left at zero.
    pub end_bar: Barline,
    pub staves: Vec<Staff>,
    pub directions: Vec<Direction>,
    pub alternate_endings: Vec<AlternateEnding>,
}

impl System {
    pub fn new(barlines: Vec<Barline>, staves: Vec<Staff>) -> System {
        System {
            barlines,
            staves,
            ..Default::default()
        }
    }

    /// The number of position slots in the system, which is where the end bar sits.
    pub fn position_count(&self) -> u32 {
        self.end_bar.position
    }

    /// Start bar, interior barlines and end bar, in order.
    pub fn all_barlines(&self) -> impl Iterator<Item = &Barline> {
        std::iter::once(&self.start_bar)
            .chain(self.barlines.iter())
            .chain(std::iter::once(&self.end_bar))
    }

    /// Start bar and interior barlines; each one opens a bar.
    pub fn bar_openings(&self) -> impl Iterator<Item = &Barline> {
        std::iter::once(&self.start_bar).chain(self.barlines.iter())
    }

    /// The barline opening the bar that contains the position.
    pub fn preceding_barline(&self, position: u32) -> &Barline {
        self.barlines
            .iter()
            .rev()
            .find(|barline| barline.position <= position)
            .unwrap_or(&self.start_bar)
    }

    /// The barline closing the bar that contains the position.
    pub fn next_barline(&self, position: u32) -> &Barline {
        self.barlines
            .iter()
            .find(|barline| barline.position > position)
            .unwrap_or(&self.end_bar)
    }

    /// Looks for a multi-bar rest in any staff or voice of the bar opened at `bar_start`.
    pub fn multibar_rest_in_bar(&self, bar_start: u32) -> Option<u8> {
        let bar_end = self.next_barline(bar_start).position;
        self.staves
            .iter()
            .flat_map(|staff| staff.voices.iter().flatten())
            .filter(|position| position.position >= bar_start && position.position < bar_end)
            .find_map(|position| position.multibar_rest)
    }

    fn last_position_index(&self) -> Option<u32> {
        self.staves
            .iter()
            .flat_map(|staff| staff.voices.iter().flatten())
            .map(|position| position.position)
            .max()
    }
}

/// A score, validated on construction.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Score {
    systems: Vec<System>,
    tempo_markers: Vec<TempoMarker>,
    guitars: Vec<Guitar>,
}

impl Score {
    /// Creates a new score, validating and normalizing it.
    pub fn new(
        systems: Vec<System>,
        tempo_markers: Vec<TempoMarker>,
        guitars: Vec<Guitar>,
    ) -> Result<Score, ScoreError> {
        Score {
            systems,
            tempo_markers,
            guitars,
        }
        .validate()
    }

    /// Parses a score from YAML.
    pub fn from_yaml(contents: &str) -> Result<Score, ScoreError> {
        serde_yml::from_str::<Score>(contents)?.validate()
    }

    /// Loads a score from a YAML file.
    pub fn load(path: &Path) -> Result<Score, ScoreError> {
        let contents = fs::read_to_string(path).map_err(|source| ScoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Score::from_yaml(&contents)
    }

    pub fn systems(&self) -> &[System] {
        &self.systems
    }

    pub fn system(&self, index: u32) -> Option<&System> {
        self.systems.get(index as usize)
    }

    pub fn tempo_markers(&self) -> &[TempoMarker] {
        &self.tempo_markers
    }

    pub fn guitars(&self) -> &[Guitar] {
        &self.guitars
    }

    pub fn guitar(&self, staff: usize) -> Option<&Guitar> {
        self.guitars.get(staff)
    }

    /// The first location of the score.
    pub fn start(&self) -> SystemLocation {
        SystemLocation::default()
    }

    /// A location past every event of the score.
    pub fn end(&self) -> SystemLocation {
        SystemLocation::new(self.systems.len() as u32, 0)
    }

    /// Clamps a location into the score. Systems past the last one clamp to the score end and
    /// positions past the end bar clamp to the end bar.
    pub fn clamp(&self, location: SystemLocation) -> SystemLocation {
        match self.system(location.system) {
            Some(system) => SystemLocation::new(
                location.system,
                location.position.min(system.position_count()),
            ),
            None => self.end(),
        }
    }

    /// The time signature governing a location: the latest one set at or before it, or 4/4.
    pub fn time_signature_at(&self, location: SystemLocation) -> TimeSignature {
        let Some(system) = self.system(location.system) else {
            return TimeSignature::default();
        };

        let current = system
            .bar_openings()
            .filter(|barline| barline.position <= location.position)
            .collect::<Vec<&Barline>>();
        let earlier = self.systems[..location.system as usize]
            .iter()
            .rev()
            .flat_map(|system| system.bar_openings().collect::<Vec<&Barline>>().into_iter().rev());

        current
            .into_iter()
            .rev()
            .chain(earlier)
            .find_map(|barline| barline.time_signature)
            .unwrap_or_default()
    }

    fn validate(mut self) -> Result<Score, ScoreError> {
        for marker in self.tempo_markers.iter() {
            if marker.beats_per_minute == 0 {
                return Err(ScoreError::ZeroTempo {
                    location: marker.location(),
                });
            }
        }
        self.tempo_markers.sort_by_key(TempoMarker::location);

        for (system_index, system) in self.systems.iter_mut().enumerate() {
            validate_system(system_index, system, &self.guitars)?;
        }

        Ok(self)
    }
}

fn validate_system(
    system_index: usize,
    system: &mut System,
    guitars: &[Guitar],
) -> Result<(), ScoreError> {
    let location = |position: u32| SystemLocation::new(system_index as u32, position);

    system.start_bar.position = 0;
    system.barlines.sort_by_key(|barline| barline.position);
    system.directions.sort_by_key(|direction| direction.position);
    system
        .alternate_endings
        .sort_by_key(|ending| ending.position);

    for (staff_index, staff) in system.staves.iter_mut().enumerate() {
        if staff.voices.len() > NUM_STAFF_VOICES {
            return Err(ScoreError::TooManyVoices {
                system: system_index,
                staff: staff_index,
                voices: staff.voices.len(),
                max: NUM_STAFF_VOICES,
            });
        }
        let guitar = guitars.get(staff_index).ok_or(ScoreError::MissingGuitar {
            system: system_index,
            staff: staff_index,
        })?;

        for voice in staff.voices.iter_mut() {
            voice.sort_by_key(|position| position.position);
            for position in voice.iter() {
                if !matches!(position.duration_type, 1 | 2 | 4 | 8 | 16 | 32 | 64) {
                    return Err(ScoreError::InvalidDuration {
                        location: location(position.position),
                        duration_type: position.duration_type,
                    });
                }
                if let Some(note) = position
                    .notes
                    .iter()
                    .find(|note| usize::from(note.string) >= guitar.tuning.len())
                {
                    return Err(ScoreError::InvalidString {
                        system: system_index,
                        staff: staff_index,
                        string: note.string,
                        strings: guitar.tuning.len(),
                    });
                }
            }
        }
    }

    // The end bar sits one past the last position unless it was placed further out.
    let minimum_end = system
        .last_position_index()
        .map(|last| last + 1)
        .into_iter()
        .chain(system.barlines.last().map(|barline| barline.position + 1))
        .max()
        .unwrap_or(0);
    system.end_bar.position = system.end_bar.position.max(minimum_end);

    if let Some(barline) = system
        .barlines
        .iter()
        .find(|barline| barline.position == 0 || barline.position >= system.end_bar.position)
    {
        return Err(ScoreError::BarlineOutOfRange {
            system: system_index,
            position: barline.position,
        });
    }

    for barline in system.all_barlines() {
        if let Some(time_signature) = barline.time_signature {
            if !time_signature.is_valid() {
                return Err(ScoreError::InvalidTimeSignature {
                    location: location(barline.position),
                    beats_per_measure: time_signature.beats_per_measure,
                    beat_amount: time_signature.beat_amount,
                });
            }
        }
    }

    for ending in system.alternate_endings.iter() {
        if let Some(number) = ending
            .numbers
            .iter()
            .find(|number| **number == 0 || **number > MAX_ALTERNATE_ENDING)
        {
            return Err(ScoreError::InvalidEnding {
                location: location(ending.position),
                number: *number,
            });
        }
    }

    Ok(())
}
