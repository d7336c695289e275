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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Overrides the configured priority of the playback worker (0-99).
const THREAD_PRIORITY_ENV: &str = "TABPLAY_THREAD_PRIORITY";

/// Requests SCHED_FIFO for the playback worker when set.
const REALTIME_ENV: &str = "TABPLAY_REALTIME_PLAYBACK";

/// Resolves the playback worker priority from the environment, falling back to the configured
/// value. None leaves the worker at the default priority.
pub fn playback_thread_priority(configured: Option<u8>) -> Option<ThreadPriorityValue> {
    std::env::var(THREAD_PRIORITY_ENV)
        .ok()
        .and_then(|value| value.parse::<u8>().ok())
        .or(configured)
        .and_then(|priority| {
            (priority < 100).then(|| ThreadPriorityValue::try_from(priority).ok())?
        })
}

pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Raises the priority of the calling thread. Failures are logged and otherwise ignored.
pub fn configure_playback_thread_priority(priority: ThreadPriorityValue) {
    let tp = ThreadPriority::Crossplatform(priority);
    if let Err(e) = set_current_thread_priority(tp) {
        warn!(err = ?e, "Unable to raise playback thread priority");
        return;
    }

    #[cfg(unix)]
    if env_flag(REALTIME_ENV) {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        match set_thread_priority_and_policy(
            thread_native_id(),
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for playback thread"),
            Err(e) => warn!(error = %e, "Failed to set RT SCHED_FIFO for playback thread"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_configured_priority() {
        // The environment override is not set in tests.
        if std::env::var(THREAD_PRIORITY_ENV).is_ok() {
            return;
        }
        assert_eq!(
            Some(ThreadPriorityValue::try_from(50u8).expect("valid priority")),
            playback_thread_priority(Some(50))
        );
        assert_eq!(None, playback_thread_priority(Some(100)));
        assert_eq!(None, playback_thread_priority(None));
    }
}
