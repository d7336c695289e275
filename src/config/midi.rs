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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_MIDI_PLAYBACK_DELAY: Duration = Duration::ZERO;

/// A YAML representation of the MIDI configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Midi {
    /// The MIDI output device.
    device: String,

    /// Controls how long to wait before the first event of a session.
    playback_delay: Option<String>,

    /// MIDI channels (1-16) that are never sent to the device.
    exclude_channels: Option<Vec<u8>>,
}

impl Midi {
    /// New will create a new MIDI configuration.
    pub fn new(device: &str, playback_delay: Option<String>) -> Midi {
        Midi {
            device: device.to_string(),
            playback_delay,
            exclude_channels: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the playback delay from the configuration.
    pub fn playback_delay(&self) -> Result<Duration, ConfigError> {
        match &self.playback_delay {
            Some(playback_delay) => Ok(DurationString::from_string(playback_delay.clone())
                .map_err(|e| ConfigError::InvalidDuration {
                    value: playback_delay.clone(),
                    reason: e.to_string(),
                })?
                .into()),
            None => Ok(DEFAULT_MIDI_PLAYBACK_DELAY),
        }
    }

    /// Gets the zero-based MIDI channels to exclude.
    pub fn exclude_channels(&self) -> Result<Vec<u8>, ConfigError> {
        self.exclude_channels
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|channel| match channel {
                1..=16 => Ok(channel - 1),
                _ => Err(ConfigError::InvalidChannel(channel)),
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Midi {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_midi_deserialize() {
        let midi = parse(
            r#"
            device: mock-midi
            playback_delay: 500ms
            exclude_channels:
              - 10
              - 1
        "#,
        );

        assert_eq!("mock-midi", midi.device());
        assert_eq!(Duration::from_millis(500), midi.playback_delay().unwrap());
        assert_eq!(vec![9, 0], midi.exclude_channels().unwrap());
    }

    #[test]
    fn test_midi_defaults() {
        let midi = Midi::new("mock-midi", None);

        assert_eq!(Duration::ZERO, midi.playback_delay().unwrap());
        assert!(midi.exclude_channels().unwrap().is_empty());
    }

    #[test]
    fn test_midi_invalid_values() {
        let midi = parse(
            r#"
            device: mock-midi
            playback_delay: soon
            exclude_channels:
              - 17
        "#,
        );

        assert!(matches!(
            midi.playback_delay(),
            Err(ConfigError::InvalidDuration { .. })
        ));
        assert!(matches!(
            midi.exclude_channels(),
            Err(ConfigError::InvalidChannel(17))
        ));
    }
}
