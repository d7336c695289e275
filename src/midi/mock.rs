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

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{playback::MidiEvent, score::Guitar};

/// A mock device. Doesn't actually play anything, but remembers what it was asked to do.
#[derive(Clone)]
pub struct Device {
    name: String,
    exclude_channels: HashSet<u8>,
    performed: Arc<Mutex<Vec<MidiEvent>>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    setups: Arc<Mutex<usize>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            exclude_channels: HashSet::new(),
            performed: Arc::new(Mutex::new(Vec::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            setups: Arc::new(Mutex::new(0)),
        }
    }

    /// Drops events on the given channels.
    pub fn excluding(mut self, exclude_channels: HashSet<u8>) -> Device {
        self.exclude_channels = exclude_channels;
        self
    }

    /// The events performed so far.
    pub fn performed(&self) -> Vec<MidiEvent> {
        self.performed.lock().clone()
    }

    /// The raw messages sent so far, including setup and silence messages.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    /// How many times the device was set up.
    pub fn setups(&self) -> usize {
        *self.setups.lock()
    }

    fn record(&self, events: &[midly::live::LiveEvent<'static>]) -> Result<(), Box<dyn Error>> {
        let mut sent = self.sent.lock();
        for event in events {
            sent.push(super::encode(event)?);
        }
        Ok(())
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn setup(&self, guitars: &[Guitar]) -> Result<(), Box<dyn Error>> {
        info!(device = self.name, guitars = guitars.len(), "Setting up channels.");
        *self.setups.lock() += 1;
        self.record(&super::setup_events(guitars))
    }

    fn perform(&self, event: &MidiEvent) -> Result<(), Box<dyn Error>> {
        if self.exclude_channels.contains(&event.channel) {
            return Ok(());
        }

        debug!(device = self.name, event = ?event.kind, "Performing event.");
        self.performed.lock().push(*event);
        self.record(&event.to_live_events())
    }

    fn silence(&self) -> Result<(), Box<dyn Error>> {
        self.record(&super::silence_events())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use crate::{
        midi::Device as _,
        playback::{MidiEvent, MidiEventKind},
        score::SystemLocation,
    };

    use super::Device;

    #[test]
    fn test_excluded_channels_are_dropped() {
        let device = Device::get("mock").excluding(HashSet::from([9]));
        let location = SystemLocation::default();

        device
            .perform(&MidiEvent::metronome(0.0, 500.0, location, 127))
            .expect("perform");
        device
            .perform(&MidiEvent::stop_note(0, 0.0, location, 64))
            .expect("perform");

        let performed = device.performed();
        assert_eq!(1, performed.len());
        assert_eq!(MidiEventKind::StopNote { pitch: 64 }, performed[0].kind);
        assert_eq!(vec![vec![0x80, 64, 0]], device.sent());
    }
}
