// Manual scheduler - a virtual clock driven explicitly by the caller
// Used by tests and headless hosts; no audio resource involved

use std::sync::Mutex;

use crate::pattern::{StepLength, clamp_bpm};
use crate::sched::{ScheduleError, ScheduleHandle, ScheduleTime, TickCallback, TickScheduler};

struct ManualState {
    now: ScheduleTime,
    bpm: f64,
    subdivision: StepLength,
    next_tick: ScheduleTime,
    active: Option<u64>,
    next_handle: u64,
}

/// A scheduler whose time only moves when the caller advances it
///
/// Ticks fire synchronously on the advancing thread, which makes playback
/// fully deterministic: `advance_ticks(n)` delivers exactly `n` ticks.
pub struct ManualScheduler {
    state: Mutex<ManualState>,
    // Kept out of `state` so tempo changes from inside a tick don't deadlock
    callback: Mutex<Option<TickCallback>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: 0.0,
                bpm: crate::pattern::DEFAULT_BPM,
                subdivision: StepLength::Sixteenth,
                next_tick: 0.0,
                active: None,
                next_handle: 1,
            }),
            callback: Mutex::new(None),
        }
    }

    /// Deliver exactly `count` ticks, jumping the clock to each boundary
    pub fn advance_ticks(&self, count: usize) {
        for _ in 0..count {
            if !self.fire_next() {
                return;
            }
        }
    }

    /// Advance the clock by `dt` seconds, delivering every tick that falls due
    pub fn advance_secs(&self, dt: f64) {
        let target = match self.state.lock() {
            Ok(state) => state.now + dt,
            Err(_) => return,
        };

        loop {
            let due = match self.state.lock() {
                Ok(state) => state.active.is_some() && state.next_tick <= target,
                Err(_) => return,
            };
            if !due || !self.fire_next() {
                break;
            }
        }

        if let Ok(mut state) = self.state.lock() {
            if state.now < target {
                state.now = target;
            }
        }
    }

    /// Jump to the next tick boundary and fire the callback once
    fn fire_next(&self) -> bool {
        let due = {
            let Ok(mut state) = self.state.lock() else {
                return false;
            };
            if state.active.is_none() {
                return false;
            }
            let due = state.next_tick;
            state.now = due;
            state.next_tick = due + state.subdivision.duration_secs(state.bpm);
            due
        };

        if let Ok(mut callback) = self.callback.lock() {
            if let Some(callback) = callback.as_mut() {
                callback(due);
                return true;
            }
        }
        false
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TickScheduler for ManualScheduler {
    fn now(&self) -> ScheduleTime {
        self.state.lock().map(|state| state.now).unwrap_or(0.0)
    }

    fn schedule_repeating(
        &self,
        subdivision: StepLength,
        callback: TickCallback,
    ) -> Result<ScheduleHandle, ScheduleError> {
        let Ok(mut state) = self.state.lock() else {
            return Err(ScheduleError::ResourceUnavailable("state poisoned".into()));
        };
        if state.active.is_some() {
            return Err(ScheduleError::AlreadyScheduled);
        }

        let id = state.next_handle;
        state.next_handle += 1;
        state.active = Some(id);
        state.subdivision = subdivision;
        state.next_tick = state.now;
        drop(state);

        if let Ok(mut slot) = self.callback.lock() {
            *slot = Some(callback);
        }
        Ok(ScheduleHandle(id))
    }

    fn cancel(&self, handle: ScheduleHandle) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.active == Some(handle.0) {
            state.active = None;
            drop(state);
            // try_lock: cancellation from inside a tick must not deadlock on
            // the callback slot; the stale callback is dropped on reschedule
            if let Ok(mut slot) = self.callback.try_lock() {
                *slot = None;
            }
        }
    }

    fn set_tempo(&self, bpm: f64) {
        if let Ok(mut state) = self.state.lock() {
            state.bpm = clamp_bpm(bpm);
        }
    }
}
