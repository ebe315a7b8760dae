// Pattern data model - the project snapshot shape read by the engine

pub mod project;
pub mod step;
pub mod track;

pub use project::{
    DEFAULT_BPM, Instrument, InstrumentKind, InstrumentParams, MAX_BPM, MIN_BPM, PatternLength,
    Project, SnapshotError, Waveform, clamp_bpm,
};
pub use step::{MAX_RATCHET, MICROTIMING_LIMIT, Step, StepLength, beat_duration_secs, clamp_unit};
pub use track::{Track, fresh_steps, resize_steps};

use uuid::Uuid;

/// Generate a prefixed snapshot id, e.g. "track-9f2c81aa"
pub(crate) fn generate_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &hex[..8])
}
