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
use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::player::PlayerOptions;

use super::{error::ConfigError, midi::Midi};

/// Prefix of environment variables that override the configuration file, e.g.
/// TABPLAY_MIDI__DEVICE.
const ENV_PREFIX: &str = "TABPLAY";

fn default_metronome() -> bool {
    true
}

/// The configuration for the score player.
#[derive(Deserialize, Clone, Debug)]
pub struct Player {
    /// The MIDI configuration.
    midi: Midi,

    /// Whether metronome clicks are played.
    #[serde(default = "default_metronome")]
    metronome: bool,

    /// Priority of the playback thread (0-99).
    thread_priority: Option<u8>,
}

impl Player {
    /// Creates a new player configuration.
    pub fn new(midi: Midi, metronome: bool, thread_priority: Option<u8>) -> Player {
        Player {
            midi,
            metronome,
            thread_priority,
        }
    }

    /// Parse a player configuration from a YAML file, applying environment overrides.
    pub fn deserialize(path: &Path) -> Result<Player, ConfigError> {
        Player::deserialize_with_environment(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn deserialize_with_environment(
        path: &Path,
        environment: Environment,
    ) -> Result<Player, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .add_source(
                environment
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Player>()?)
    }

    /// Gets the MIDI configuration.
    pub fn midi(&self) -> &Midi {
        &self.midi
    }

    pub fn metronome(&self) -> bool {
        self.metronome
    }

    /// The options for the player built from this configuration.
    pub fn options(&self) -> Result<PlayerOptions, ConfigError> {
        Ok(PlayerOptions {
            playback_delay: self.midi.playback_delay()?,
            metronome: self.metronome,
            thread_priority: self.thread_priority,
        })
    }
}
