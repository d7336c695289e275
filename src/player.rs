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
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info, span, warn, Level, Span};

use crate::{
    midi,
    playback::{
        schedule::{schedule, without_metronome},
        AccurateTimer, PlaybackNotification, RepeatController, Session, SessionOutcome,
    },
    playsync::CancelHandle,
    score::{Score, SystemLocation},
    thread_priority::{configure_playback_thread_priority, playback_thread_priority},
};

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("playback is already running")]
    AlreadyPlaying,

    #[error("unable to start the playback thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("the playback thread panicked")]
    Panicked,
}

/// Tunables for playback sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerOptions {
    /// How long to wait after setting up the device before the first event.
    pub playback_delay: Duration,
    /// Whether the metronome clicks are played.
    pub metronome: bool,
    /// Priority of the playback worker thread.
    pub thread_priority: Option<u8>,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        PlayerOptions {
            playback_delay: Duration::ZERO,
            metronome: true,
            thread_priority: None,
        }
    }
}

struct PlayHandles {
    join: JoinHandle<SessionOutcome>,
    cancel: CancelHandle,
    /// Receives the outcome once the session ends.
    done: Receiver<SessionOutcome>,
}

/// Plays a score through a MIDI device, one session at a time.
pub struct Player {
    /// The score to play.
    score: Arc<Score>,
    /// The device events are performed on.
    device: Arc<dyn midi::Device>,
    /// Receives caret updates.
    notifier: Option<Sender<PlaybackNotification>>,
    options: PlayerOptions,
    /// The running session, if any. There should only be one at a time.
    join: Mutex<Option<PlayHandles>>,
    /// The logging span.
    span: Span,
}

impl Player {
    /// Creates a new player.
    pub fn new(
        score: Arc<Score>,
        device: Arc<dyn midi::Device>,
        notifier: Option<Sender<PlaybackNotification>>,
        options: PlayerOptions,
    ) -> Player {
        Player {
            score,
            device,
            notifier,
            options,
            join: Mutex::new(None),
            span: span!(Level::INFO, "player"),
        }
    }

    pub fn score(&self) -> Arc<Score> {
        self.score.clone()
    }

    /// Starts playback from the given system and position. Locations outside the score are
    /// clamped to it.
    pub fn start(&self, system: u32, position: u32) -> Result<(), PlayerError> {
        let _enter = self.span.enter();

        let mut join = self.join.lock();
        if let Some(handles) = join.as_ref() {
            if !handles.join.is_finished() {
                info!("Player is already playing.");
                return Err(PlayerError::AlreadyPlaying);
            }
        }
        // Reap a session that finished on its own.
        if let Some(handles) = join.take() {
            if handles.join.join().is_err() {
                error!("Previous playback thread panicked.");
            }
        }

        let start = self.score.clamp(SystemLocation::new(system, position));
        let cancel_handle = CancelHandle::new();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        info!(
            device = self.device.name(),
            start = %start,
            "Starting playback."
        );

        let join_handle = {
            let score = self.score.clone();
            let device = self.device.clone();
            let notifier = self.notifier.clone();
            let options = self.options;
            let cancel_handle = cancel_handle.clone();
            thread::Builder::new()
                .name("tabplay playback".to_string())
                .spawn(move || {
                    let outcome =
                        Player::play(score, device, notifier, options, cancel_handle, start);
                    let _ = done_tx.send(outcome);
                    outcome
                })?
        };

        *join = Some(PlayHandles {
            join: join_handle,
            cancel: cancel_handle,
            done: done_rx,
        });

        Ok(())
    }

    /// The body of the playback worker.
    fn play(
        score: Arc<Score>,
        device: Arc<dyn midi::Device>,
        notifier: Option<Sender<PlaybackNotification>>,
        options: PlayerOptions,
        cancel_handle: CancelHandle,
        start: SystemLocation,
    ) -> SessionOutcome {
        if let Some(priority) = playback_thread_priority(options.thread_priority) {
            configure_playback_thread_priority(priority);
        }

        let mut events = schedule(&score);
        if !options.metronome {
            events = without_metronome(&events);
        }

        if let Err(e) = device.setup(score.guitars()) {
            warn!(device = device.name(), err = %e, "Unable to set up MIDI device.");
        }

        if !options.playback_delay.is_zero() && cancel_handle.wait_timeout(options.playback_delay)
        {
            return SessionOutcome::Cancelled;
        }

        let mut session = Session::new(events, RepeatController::new(&score), notifier);
        session.run(
            device.as_ref(),
            &mut AccurateTimer::new(),
            &cancel_handle,
            start,
        )
    }

    /// Returns true while a session is running.
    pub fn is_playing(&self) -> bool {
        self.join
            .lock()
            .as_ref()
            .is_some_and(|handles| !handles.join.is_finished())
    }

    /// Stops the running session, if any, and silences the device. No event of the session is
    /// performed once this returns.
    pub fn stop(&self) -> Result<(), PlayerError> {
        let _enter = self.span.enter();

        let Some(handles) = self.join.lock().take() else {
            info!("Player is not active, nothing to stop.");
            return Ok(());
        };

        info!("Stopping playback.");
        handles.cancel.cancel();
        let outcome = handles.join.join().map_err(|_| PlayerError::Panicked)?;
        info!(outcome = ?outcome, "Playback stopped.");

        if let Err(e) = self.device.silence() {
            warn!(device = self.device.name(), err = %e, "Unable to silence MIDI device.");
        }
        Ok(())
    }

    /// Waits for the running session to end. Returns its outcome, or None if nothing was
    /// playing. The session can still be stopped from elsewhere while waiting.
    pub fn wait(&self) -> Result<Option<SessionOutcome>, PlayerError> {
        let _enter = self.span.enter();

        let done = match self.join.lock().as_ref() {
            Some(handles) => handles.done.clone(),
            None => return Ok(None),
        };

        info!("Waiting for playback to finish.");
        let outcome = done.recv().ok();

        if let Some(handles) = self.join.lock().take() {
            handles.join.join().map_err(|_| PlayerError::Panicked)?;
        }
        Ok(outcome)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(err = %e, "Error stopping player.");
        }
    }
}
