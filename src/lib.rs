// gridbeat - Step-pattern playback engine
// Transport clock, per-step trigger decisions and the dispatch contract to
// instruments; UI, persistence and synthesis live outside this crate

pub mod engine;
pub mod instrument;
pub mod messaging;
pub mod pattern;
pub mod sched;

// Re-export commonly used types for convenience
pub use engine::clock::{StartError, TransportClock, TransportState};
pub use engine::evaluator::{TrackTriggers, TriggerEvent, evaluate_step, evaluate_track};
pub use engine::playhead::{Playhead, StepObserver};
pub use engine::rng::{EntropyRng, GateRng, ScriptedRng};
pub use engine::{Engine, SnapshotSlot};
pub use instrument::{
    InstrumentHandle, InstrumentRack, InstrumentResolver, MidiVoice, SynthVoice, build_handle,
};
pub use messaging::channels::{create_playhead_channel, create_trigger_channel, playhead_feed};
pub use messaging::command::TriggerCommand;
pub use pattern::{
    Instrument, InstrumentKind, InstrumentParams, PatternLength, Project, SnapshotError, Step,
    StepLength, Track, Waveform, resize_steps,
};
pub use sched::{
    CpalDriver, ManualScheduler, ScheduleError, ScheduleHandle, ScheduleTime, TickCallback,
    TickScheduler,
};
