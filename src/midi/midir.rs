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
use std::{collections::HashSet, error::Error, fmt};

use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use midly::live::LiveEvent;
use parking_lot::Mutex;
use tracing::{debug, info, span, Level};

use crate::{playback::MidiEvent, score::Guitar};

/// A MIDI output port. The connection is opened on first use and kept for the lifetime of the
/// device.
pub struct Device {
    name: String,
    output_port: MidiOutputPort,
    connection: Mutex<Option<MidiOutputConnection>>,
    exclude_channels: HashSet<u8>,
}

impl Device {
    /// Sends the events through the output connection, connecting if needed.
    fn send(&self, events: &[LiveEvent<'static>]) -> Result<(), Box<dyn Error>> {
        let mut connection = self.connection.lock();
        if connection.is_none() {
            let output = MidiOutput::new("tabplay output")?;
            *connection = Some(output.connect(&self.output_port, "tabplay player")?);
            info!(device = self.name, "Connected to MIDI output.");
        }

        if let Some(connection) = connection.as_mut() {
            for event in events {
                connection.send(&super::encode(event)?)?;
            }
        }

        Ok(())
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn setup(&self, guitars: &[Guitar]) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "setup (midir)");
        let _enter = span.enter();

        info!(device = self.name, guitars = guitars.len(), "Setting up channels.");
        self.send(&super::setup_events(guitars))
    }

    fn perform(&self, event: &MidiEvent) -> Result<(), Box<dyn Error>> {
        if self.exclude_channels.contains(&event.channel) {
            return Ok(());
        }

        debug!(
            device = self.name,
            channel = event.channel,
            time = event.start_time,
            event = ?event.kind,
            "Performing event."
        );
        self.send(&event.to_live_events())
    }

    fn silence(&self) -> Result<(), Box<dyn Error>> {
        debug!(device = self.name, "Silencing all channels.");
        self.send(&super::silence_events())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Output)", self.name)
    }
}

/// Lists midir devices and produces the Device trait.
pub fn list() -> Result<Vec<Box<dyn super::Device>>, Box<dyn Error>> {
    Ok(list_midir_devices()?
        .into_iter()
        .map(|device| {
            let device: Box<dyn super::Device> = Box::new(device);
            device
        })
        .collect())
}

/// Lists midir output devices, sorted by name.
fn list_midir_devices() -> Result<Vec<Device>, Box<dyn Error>> {
    let output = MidiOutput::new("tabplay output listing")?;

    let mut devices = output
        .ports()
        .into_iter()
        .map(|port| {
            Ok(Device {
                name: output.port_name(&port)?,
                output_port: port,
                connection: Mutex::new(None),
                exclude_channels: HashSet::new(),
            })
        })
        .collect::<Result<Vec<Device>, Box<dyn Error>>>()?;
    devices.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(devices)
}

/// Gets the given midir device.
pub fn get(name: &str, exclude_channels: HashSet<u8>) -> Result<Device, Box<dyn Error>> {
    let mut matches = list_midir_devices()?
        .into_iter()
        .filter(|device| device.name.contains(name))
        .collect::<Vec<Device>>();

    if matches.is_empty() {
        return Err(format!("no device found with name {}", name).into());
    }
    if matches.len() > 1 {
        return Err(format!(
            "found too many devices that match ({}), use a less ambiguous device name",
            matches
                .iter()
                .map(|device| device.name.clone())
                .collect::<Vec<String>>()
                .join(", ")
        )
        .into());
    }

    // We've verified that there's only one element in the vector, so this should be safe.
    Ok({
        let mut device = matches.swap_remove(0);
        device.exclude_channels = exclude_channels;
        device
    })
}
