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
use std::{collections::HashSet, error::Error, fmt, sync::Arc};

use midly::live::LiveEvent;

use crate::{
    playback::{
        event::{
            control_change, program_change, ALL_NOTES_OFF_CONTROLLER, MODULATION_CONTROLLER,
            PAN_CONTROLLER, VOLUME_CONTROLLER,
        },
        generator::staff_channel,
        MidiEvent,
    },
    score::Guitar,
};

mod midir;
mod mock;

/// The number of MIDI channels on a device.
const NUM_CHANNELS: u8 = 16;

/// A MIDI output that playback events are performed on.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// Prepares the channel of each guitar: program, volume and pan.
    fn setup(&self, guitars: &[Guitar]) -> Result<(), Box<dyn Error>>;

    /// Performs a single playback event.
    fn perform(&self, event: &MidiEvent) -> Result<(), Box<dyn Error>>;

    /// Releases every note and resets modulation on every channel.
    fn silence(&self) -> Result<(), Box<dyn Error>>;
}

/// Lists devices known to midir.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    midir::list()
}

/// Gets a device with the given name. Events on the excluded channels are never sent.
pub fn get_device(name: &str, exclude_channels: &[u8]) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let exclude_channels = HashSet::from_iter(exclude_channels.iter().copied());
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name).excluding(exclude_channels)));
    };

    Ok(Arc::new(midir::get(name, exclude_channels)?))
}

/// The messages that prepare the channel of each guitar.
fn setup_events(guitars: &[Guitar]) -> Vec<LiveEvent<'static>> {
    guitars
        .iter()
        .enumerate()
        .flat_map(|(staff, guitar)| {
            let channel = staff_channel(staff);
            [
                program_change(channel, guitar.preset),
                control_change(channel, VOLUME_CONTROLLER, guitar.volume),
                control_change(channel, PAN_CONTROLLER, guitar.pan),
            ]
        })
        .collect()
}

/// The messages that silence every channel.
fn silence_events() -> Vec<LiveEvent<'static>> {
    (0..NUM_CHANNELS)
        .flat_map(|channel| {
            [
                control_change(channel, ALL_NOTES_OFF_CONTROLLER, 0),
                control_change(channel, MODULATION_CONTROLLER, 0),
            ]
        })
        .collect()
}

/// Encodes a live event into its raw bytes.
fn encode(event: &LiveEvent<'static>) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut buf: Vec<u8> = Vec::with_capacity(8);
    event.write(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
pub mod test {
    pub use super::mock::Device;

    use super::*;

    #[test]
    fn test_setup_events() {
        let guitars = vec![
            Guitar::default(),
            Guitar {
                preset: 30,
                volume: 90,
                pan: 20,
                ..Default::default()
            },
        ];

        let encoded = setup_events(&guitars)
            .iter()
            .map(encode)
            .collect::<Result<Vec<Vec<u8>>, Box<dyn Error>>>()
            .expect("events should encode");

        assert_eq!(
            vec![
                vec![0xC0, 25],
                vec![0xB0, 7, 104],
                vec![0xB0, 10, 64],
                vec![0xC1, 30],
                vec![0xB1, 7, 90],
                vec![0xB1, 10, 20],
            ],
            encoded
        );
    }

    #[test]
    fn test_silence_covers_every_channel() {
        let events = silence_events();
        assert_eq!(32, events.len());
        assert_eq!(
            vec![0xBF, 123, 0],
            encode(&events[30]).expect("event should encode")
        );
    }

    #[test]
    fn test_get_mock_device() {
        let device = get_device("mock-device", &[1]).expect("mock device");
        assert_eq!("mock-device", device.name());
        assert_eq!("mock-device (Mock)", device.to_string());
    }
}
