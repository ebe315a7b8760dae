// Transport clock - run state machine over the scheduling capability
// Owns the schedule handle; tick contents are the engine's business

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use crate::pattern::StepLength;
use crate::sched::{ScheduleError, ScheduleHandle, ScheduleTime, TickScheduler};

/// Transport run state
///
/// `Starting` covers the window where the scheduling resource is still
/// initializing; a stop() in that window prevents the start from ever
/// reaching `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Starting,
    Running,
}

impl TransportState {
    pub fn is_running(&self) -> bool {
        matches!(self, TransportState::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped)
    }

    fn as_u8(self) -> u8 {
        match self {
            TransportState::Stopped => 0,
            TransportState::Starting => 1,
            TransportState::Running => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => TransportState::Starting,
            2 => TransportState::Running,
            _ => TransportState::Stopped,
        }
    }
}

impl Default for TransportState {
    fn default() -> Self {
        TransportState::Stopped
    }
}

/// Failure to start playback
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("scheduling resource unavailable: {0}")]
    Scheduler(#[from] ScheduleError),
}

/// State shared with the tick callback
struct ClockShared {
    state: AtomicU8,
    // Cleared by stop(); a disarmed callback does nothing, which is how a
    // stop during Starting wins the race against the first tick
    armed: AtomicBool,
}

impl ClockShared {
    fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: TransportState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

/// The transport clock
///
/// Converts tempo into a steady stream of sixteenth-note ticks via an
/// externally supplied [`TickScheduler`]. Start is a no-op while already
/// starting or running; stop is idempotent.
pub struct TransportClock {
    shared: Arc<ClockShared>,
    scheduler: Mutex<Option<Arc<dyn TickScheduler>>>,
    handle: Mutex<Option<ScheduleHandle>>,
}

impl TransportClock {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ClockShared {
                state: AtomicU8::new(TransportState::Stopped.as_u8()),
                armed: AtomicBool::new(false),
            }),
            scheduler: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> TransportState {
        self.shared.state()
    }

    /// Begin producing ticks through `scheduler`, delivering each to
    /// `on_tick`
    ///
    /// The clock transitions to `Running` on the first delivered tick; until
    /// then it reports `Starting`. Returns the scheduler's error when the
    /// resource is unavailable, leaving the clock `Stopped`.
    pub fn start(
        &self,
        scheduler: Arc<dyn TickScheduler>,
        mut on_tick: impl FnMut(ScheduleTime) + Send + 'static,
    ) -> Result<(), StartError> {
        if self.shared.state() != TransportState::Stopped {
            return Ok(());
        }

        self.shared.set_state(TransportState::Starting);
        self.shared.armed.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let callback = Box::new(move |time: ScheduleTime| {
            if !shared.armed.load(Ordering::Acquire) {
                return;
            }
            if shared.state() == TransportState::Starting {
                shared.set_state(TransportState::Running);
            }
            on_tick(time);
        });

        match scheduler.schedule_repeating(StepLength::Sixteenth, callback) {
            Ok(handle) => {
                // stop() may have raced us while the resource initialized
                if !self.shared.armed.load(Ordering::Acquire) {
                    scheduler.cancel(handle);
                    self.shared.set_state(TransportState::Stopped);
                    return Ok(());
                }
                if let Ok(mut slot) = self.handle.lock() {
                    *slot = Some(handle);
                }
                if let Ok(mut slot) = self.scheduler.lock() {
                    *slot = Some(scheduler);
                }
                Ok(())
            }
            Err(err) => {
                self.shared.armed.store(false, Ordering::Release);
                self.shared.set_state(TransportState::Stopped);
                Err(StartError::Scheduler(err))
            }
        }
    }

    /// Halt tick production
    ///
    /// Takes effect at a tick boundary: an in-flight tick completes, no
    /// further ticks are delivered. Safe to call in any state.
    pub fn stop(&self) {
        self.shared.armed.store(false, Ordering::Release);
        if self.shared.state() == TransportState::Stopped {
            return;
        }

        let handle = self.handle.lock().ok().and_then(|mut slot| slot.take());
        let scheduler = self.scheduler.lock().ok().and_then(|mut slot| slot.take());
        if let (Some(handle), Some(scheduler)) = (handle, &scheduler) {
            scheduler.cancel(handle);
        }

        self.shared.set_state(TransportState::Stopped);
    }

    /// The scheduler currently driving ticks, if any
    pub fn scheduler(&self) -> Option<Arc<dyn TickScheduler>> {
        self.scheduler.lock().ok().and_then(|slot| slot.clone())
    }
}

impl Default for TransportClock {
    fn default() -> Self {
        Self::new()
    }
}
