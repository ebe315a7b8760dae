// Playhead - current step publication and advancement
// Shared between the tick thread (writer) and observers/UI (readers)

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Callback invoked with the current step index once per tick and on stop
pub type StepObserver = Box<dyn Fn(usize) + Send>;

/// The shared playhead state
///
/// `counter` is the position the *next* tick will evaluate; `current` is the
/// last published step. Both are plain atomics so any thread can read them
/// without waiting behind a tick.
pub struct Playhead {
    counter: AtomicUsize,
    current: AtomicUsize,
    observers: Mutex<Vec<StepObserver>>,
}

impl Playhead {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Position the next tick will evaluate
    pub fn counter(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }

    /// Last published step index
    pub fn current_step(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    /// Register an observer; called on the tick thread, so it must return
    /// promptly and never panic
    pub fn add_observer(&self, observer: StepObserver) {
        if let Ok(mut observers) = self.observers.lock() {
            observers.push(observer);
        }
    }

    /// Publish the step just evaluated, then advance the counter for the
    /// next tick, wrapping at the pattern length
    pub fn publish_and_advance(&self, step: usize, pattern_length: usize) {
        self.current.store(step, Ordering::Relaxed);
        self.notify(step);
        self.counter
            .store((step + 1) % pattern_length.max(1), Ordering::Relaxed);
    }

    /// Rewind to step 0 and publish it, regardless of the prior position
    ///
    /// Runs on stop so observers always see a consistent at-rest state.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
        self.current.store(0, Ordering::Relaxed);
        self.notify(0);
    }

    fn notify(&self, step: usize) {
        if let Ok(observers) = self.observers.lock() {
            for observer in observers.iter() {
                observer(step);
            }
        }
    }
}

impl Default for Playhead {
    fn default() -> Self {
        Self::new()
    }
}
