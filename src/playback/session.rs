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
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam_channel::Sender;
use tracing::{debug, info, span, warn, Level};

use crate::{midi::Device, playsync::CancelHandle, score::SystemLocation};

use super::{
    event::{MidiEvent, MidiEventKind},
    repeat::RepeatController,
};

/// The longest stretch slept with a spin sleep. Longer sleeps wait on the cancel handle first
/// so that a stop request is seen right away.
const SPIN_SLEEP_THRESHOLD: Duration = Duration::from_millis(5);

/// Caret updates sent while playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackNotification {
    SystemChanged(u32),
    PositionChanged(u32),
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Finished,
    Cancelled,
}

/// Sleeps between events.
pub trait Timer: Send {
    /// Sleeps for the given duration, returning early if the handle is cancelled.
    fn sleep(&mut self, duration: Duration, cancel_handle: &CancelHandle);
}

/// A timer that keeps track of when the previous sleep should have ended and shortens the next
/// sleep by any overshoot, so timing errors don't pile up over a long score.
#[derive(Debug, Default)]
pub struct AccurateTimer {
    last_instant: Option<Instant>,
}

impl AccurateTimer {
    pub fn new() -> AccurateTimer {
        AccurateTimer { last_instant: None }
    }
}

impl Timer for AccurateTimer {
    fn sleep(&mut self, duration: Duration, cancel_handle: &CancelHandle) {
        let deadline = match self.last_instant {
            Some(last_instant) => last_instant + duration,
            None => Instant::now() + duration,
        };
        self.last_instant = Some(deadline);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            if remaining <= SPIN_SLEEP_THRESHOLD {
                spin_sleep::sleep(remaining);
                return;
            }
            if cancel_handle.wait_timeout(remaining - SPIN_SLEEP_THRESHOLD) {
                return;
            }
        }
    }
}

/// Notes and vibratos that were started and not yet stopped.
#[derive(Debug, Default)]
struct Sounding {
    notes: Vec<(u8, u8)>,
    vibrato_channels: Vec<u8>,
}

impl Sounding {
    fn track(&mut self, event: &MidiEvent) {
        if let Some(note) = event.released_note() {
            self.notes.retain(|sounding| *sounding != note);
        }
        if let Some(note) = event.sounding_note() {
            if !self.notes.contains(&note) {
                self.notes.push(note);
            }
        }
        match event.kind {
            MidiEventKind::VibratoOn { .. } => {
                if !self.vibrato_channels.contains(&event.channel) {
                    self.vibrato_channels.push(event.channel);
                }
            }
            MidiEventKind::VibratoOff => {
                self.vibrato_channels.retain(|channel| *channel != event.channel)
            }
            _ => {}
        }
    }

    /// Stops everything still sounding. Returns false if the session was cancelled meanwhile.
    fn release(
        &mut self,
        device: &dyn Device,
        cancel_handle: &CancelHandle,
        location: SystemLocation,
    ) -> bool {
        let releases = self
            .notes
            .drain(..)
            .map(|(channel, pitch)| MidiEvent::stop_note(channel, 0.0, location, pitch))
            .chain(
                self.vibrato_channels
                    .drain(..)
                    .map(|channel| MidiEvent::vibrato_off(channel, 0.0, location)),
            )
            .collect::<Vec<MidiEvent>>();

        releases
            .iter()
            .all(|release| perform(device, cancel_handle, release))
    }
}

/// Performs an event unless the session is cancelled. Transport errors are logged and playback
/// carries on. Returns false if the session was cancelled.
fn perform(device: &dyn Device, cancel_handle: &CancelHandle, event: &MidiEvent) -> bool {
    match cancel_handle.unless_cancelled(|| device.perform(event)) {
        None => false,
        Some(Err(e)) => {
            warn!(
                device = device.name(),
                err = %e,
                event = ?event.kind,
                "Error performing MIDI event."
            );
            true
        }
        Some(Ok(())) => true,
    }
}

/// A single playback run over a merged event list.
pub struct Session {
    events: Arc<[MidiEvent]>,
    controller: RepeatController,
    notifier: Option<Sender<PlaybackNotification>>,
}

impl Session {
    pub fn new(
        events: Arc<[MidiEvent]>,
        controller: RepeatController,
        notifier: Option<Sender<PlaybackNotification>>,
    ) -> Session {
        Session {
            events,
            controller,
            notifier,
        }
    }

    /// Plays the events from the given location until the end of the score or until the
    /// handle is cancelled.
    pub fn run(
        &mut self,
        device: &dyn Device,
        timer: &mut dyn Timer,
        cancel_handle: &CancelHandle,
        start: SystemLocation,
    ) -> SessionOutcome {
        let span = span!(Level::INFO, "playback session");
        let _enter = span.enter();

        info!(device = device.name(), start = %start, "Starting playback.");

        let events = self.events.clone();
        let mut resume = Some(start);
        let mut current_system: Option<u32> = None;
        let mut current_position: Option<u32> = None;
        let mut sounding = Sounding::default();
        let mut index = 0;

        while let Some(event) = events.get(index) {
            if cancel_handle.is_cancelled() {
                info!("Playback has been cancelled.");
                return SessionOutcome::Cancelled;
            }

            let location = event.location();
            if let Some(target) = resume {
                if location < target {
                    index += 1;
                    continue;
                }
                resume = None;
            }

            // The caret only moves forward until playback is redirected, and each move is
            // checked for repeats and directions.
            let mut moved = false;
            if current_system.map_or(true, |system| event.system > system) {
                current_system = Some(event.system);
                current_position = None;
                self.notify(PlaybackNotification::SystemChanged(event.system));
            }
            if current_system == Some(event.system)
                && current_position.map_or(true, |position| event.position > position)
            {
                current_position = Some(event.position);
                self.notify(PlaybackNotification::PositionChanged(event.position));
                moved = true;
            }

            if moved {
                if let Some(target) = self.controller.check_for_repeat(location) {
                    debug!(
                        from = %location,
                        to = %target,
                        time = event.start_time,
                        "Moving playback."
                    );
                    if !sounding.release(device, cancel_handle, location) {
                        return SessionOutcome::Cancelled;
                    }
                    resume = Some(target);
                    current_system = None;
                    current_position = None;
                    index = 0;
                    continue;
                }
            }

            if !perform(device, cancel_handle, event) {
                info!("Playback has been cancelled.");
                return SessionOutcome::Cancelled;
            }
            sounding.track(event);

            let sleep_ms = match events.get(index + 1) {
                Some(next) => next.start_time - event.start_time,
                None => event.duration,
            };
            if sleep_ms > 0.0 {
                timer.sleep(Duration::from_secs_f64(sleep_ms / 1000.0), cancel_handle);
            }

            index += 1;
        }

        let location = current_location(current_system, current_position);
        if !sounding.release(device, cancel_handle, location) {
            return SessionOutcome::Cancelled;
        }

        info!("Playback finished.");
        SessionOutcome::Finished
    }

    fn notify(&self, notification: PlaybackNotification) {
        if let Some(notifier) = self.notifier.as_ref() {
            if notifier.send(notification).is_err() {
                debug!("Nobody is listening for playback notifications.");
            }
        }
    }
}

fn current_location(system: Option<u32>, position: Option<u32>) -> SystemLocation {
    SystemLocation::new(system.unwrap_or_default(), position.unwrap_or_default())
}
