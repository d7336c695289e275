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
use std::{sync::Arc, time::Duration};

use parking_lot::{Condvar, Mutex};

/// Represents the current cancel state.
#[derive(PartialEq)]
enum CancelState {
    Untouched,
    Cancelled,
}

/// A cancel handle is passed to a playback session. It's the session's responsibility to
/// respect a cancel request.
#[derive(Clone)]
pub struct CancelHandle {
    /// Set to cancelled when the session should stop.
    cancelled: Arc<Mutex<CancelState>>,
    /// Wakes sleepers when the handle is cancelled.
    condvar: Arc<Condvar>,
}

impl CancelHandle {
    /// Creates a new cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle {
            cancelled: Arc::new(Mutex::new(CancelState::Untouched)),
            condvar: Arc::new(Condvar::new()),
        }
    }

    /// Returns true if the session has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock() == CancelState::Cancelled
    }

    /// Runs the operation while holding the cancel lock, unless the handle has been cancelled.
    /// Once `cancel` has returned, no operation passed here will run.
    pub fn unless_cancelled<T, F: FnOnce() -> T>(&self, operation: F) -> Option<T> {
        let cancelled = self.cancelled.lock();
        if *cancelled == CancelState::Cancelled {
            return None;
        }
        Some(operation())
    }

    /// Waits for the given timeout or until the handle is cancelled. Returns true if the handle
    /// was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut cancelled = self.cancelled.lock();
        if *cancelled == CancelState::Untouched {
            let _ = self.condvar.wait_while_for(
                &mut cancelled,
                |cancelled| *cancelled == CancelState::Untouched,
                timeout,
            );
        }
        *cancelled == CancelState::Cancelled
    }

    /// Cancel the session.
    pub fn cancel(&self) {
        let mut cancel_state = self.cancelled.lock();
        if *cancel_state == CancelState::Untouched {
            *cancel_state = CancelState::Cancelled;
            self.condvar.notify_all();
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        CancelHandle::new()
    }
}
