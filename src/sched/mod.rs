// Scheduling capability - periodic musical ticks over an explicit resource
// The engine consumes this interface; the audio-backed implementation lives
// in cpal.rs and a deterministic virtual one in manual.rs

pub mod cpal;
pub mod manual;

use crate::pattern::StepLength;

pub use self::cpal::CpalDriver;
pub use self::manual::ManualScheduler;

/// Absolute time on the scheduler's own timeline, in seconds
pub type ScheduleTime = f64;

/// Periodic tick callback; receives each tick's absolute schedule time
pub type TickCallback = Box<dyn FnMut(ScheduleTime) + Send>;

/// Identifies one repeating schedule for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleHandle(pub u64);

/// Errors raised while acquiring or driving the scheduling resource
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("scheduling resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("scheduler is already driving a callback")]
    AlreadyScheduled,
}

/// The scheduling facility consumed by the transport clock
///
/// Implementations deliver ticks in order, one at a time: a tick callback
/// always returns before the next tick is delivered. Tempo changes affect
/// the spacing of ticks scheduled after the change, never the subdivision
/// and never ticks whose time is already committed.
pub trait TickScheduler: Send + Sync {
    /// Current time on the scheduler's timeline
    fn now(&self) -> ScheduleTime;

    /// Install a repeating callback fired once per `subdivision`, the first
    /// tick at the current time
    fn schedule_repeating(
        &self,
        subdivision: StepLength,
        callback: TickCallback,
    ) -> Result<ScheduleHandle, ScheduleError>;

    /// Stop a repeating schedule; unknown or stale handles are ignored
    fn cancel(&self, handle: ScheduleHandle);

    /// Change the tempo used to space future ticks
    fn set_tempo(&self, bpm: f64);
}
