// Step - Per-step trigger description
// One cell of the grid: whether and how a step fires when the playhead visits it

use serde::{Deserialize, Serialize};

/// Largest meaningful ratchet subdivision of one step
pub const MAX_RATCHET: u8 = 4;

/// Microtiming offsets beyond this drift into the neighbouring step
pub const MICROTIMING_LIMIT: f64 = 0.05;

/// Symbolic step duration, expressed as a subdivision of the quarter-note beat
///
/// Serialized with the conventional notation names ("16n" = sixteenth note),
/// which is also the wire shape of project snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepLength {
    #[serde(rename = "32n")]
    ThirtySecond,
    #[serde(rename = "16n")]
    Sixteenth,
    #[serde(rename = "8n")]
    Eighth,
    #[serde(rename = "4n")]
    Quarter,
}

impl StepLength {
    /// Fraction of one quarter-note beat this length spans
    pub fn beat_fraction(&self) -> f64 {
        match self {
            StepLength::ThirtySecond => 0.125,
            StepLength::Sixteenth => 0.25,
            StepLength::Eighth => 0.5,
            StepLength::Quarter => 1.0,
        }
    }

    /// Duration in seconds at the given tempo
    ///
    /// One beat is a quarter note, so at 120 BPM a sixteenth note lasts
    /// 0.5 * 0.25 = 0.125 seconds.
    pub fn duration_secs(&self, bpm: f64) -> f64 {
        beat_duration_secs(bpm) * self.beat_fraction()
    }
}

impl Default for StepLength {
    fn default() -> Self {
        StepLength::Sixteenth
    }
}

/// Duration of one quarter-note beat in seconds
pub fn beat_duration_secs(bpm: f64) -> f64 {
    60.0 / bpm
}

/// One step of a track's pattern
///
/// `velocity` and `probability` are unit-interval values; `microtiming` is a
/// small offset in seconds applied to the trigger relative to its nominal
/// tick time. `tie` is carried through snapshots but not read by playback yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Step {
    /// Whether the playhead may fire this step at all
    pub active: bool,
    /// Trigger loudness, 0.0 to 1.0
    pub velocity: f64,
    /// Chance of firing on any given visit, 0.0 to 1.0
    pub probability: f64,
    /// Humanization offset in seconds (positive = late, negative = early)
    pub microtiming: f64,
    /// Number of equally spaced sub-triggers within the step (1 = plain hit)
    pub ratchet: u8,
    /// Note override; falls back to the track's default note when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Symbolic duration of the triggered note
    pub length: StepLength,
    /// Reserved for held notes spanning multiple steps
    pub tie: bool,
}

impl Step {
    /// Create a fresh inactive step with neutral playback settings
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Clamp every numeric field into its documented range
    ///
    /// Runs at snapshot construction so the evaluator never sees
    /// out-of-range values on the tick path.
    pub fn normalized(&self) -> Self {
        Self {
            active: self.active,
            velocity: clamp_unit(self.velocity),
            probability: clamp_unit(self.probability),
            microtiming: if self.microtiming.is_finite() {
                self.microtiming.clamp(-MICROTIMING_LIMIT, MICROTIMING_LIMIT)
            } else {
                0.0
            },
            ratchet: self.ratchet.clamp(1, MAX_RATCHET),
            note: self.note.clone(),
            length: self.length,
            tie: self.tie,
        }
    }
}

impl Default for Step {
    fn default() -> Self {
        Self {
            active: false,
            velocity: 0.9,
            probability: 1.0,
            microtiming: 0.0,
            ratchet: 1,
            note: None,
            length: StepLength::Sixteenth,
            tie: false,
        }
    }
}

/// Clamp a value to the unit interval, mapping non-finite input to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
