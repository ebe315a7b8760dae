// Track - One row of the pattern grid
// A track binds a step sequence to the instrument that renders it

use serde::{Deserialize, Serialize};

use crate::pattern::project::{Instrument, InstrumentKind, PatternLength};
use crate::pattern::step::Step;

/// A track in the project snapshot
///
/// The step vector always has exactly `pattern_length` entries; resizing
/// truncates from the tail or appends fresh inactive steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Track {
    /// Stable identifier, referenced by the owning layer
    pub id: String,
    /// Display name
    pub name: String,
    /// Kind of instrument this track drives
    #[serde(rename = "type")]
    pub kind: InstrumentKind,
    /// Reference into the project's instrument list
    pub instrument_id: String,
    /// MIDI output port routing for external-controller tracks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// One step per playhead position
    pub steps: Vec<Step>,
    /// Hard veto: a muted track never fires
    pub muted: bool,
    /// Note used by steps without an override
    pub default_note: String,
}

impl Track {
    /// Create a track wired to the given instrument, with a fresh
    /// inactive step sequence of the project's pattern length
    pub fn for_instrument(pattern_length: PatternLength, instrument: &Instrument) -> Self {
        Self {
            id: super::generate_id("track"),
            name: instrument.name.clone(),
            kind: instrument.kind,
            instrument_id: instrument.id.clone(),
            device: None,
            steps: fresh_steps(pattern_length.steps()),
            muted: false,
            default_note: instrument.kind.default_note().to_string(),
        }
    }

    /// Repair a track loaded from an untrusted snapshot payload
    ///
    /// Fills blank names and notes, clamps every step and resizes the step
    /// vector to the project's pattern length.
    pub fn normalized(&self, pattern_length: PatternLength) -> Self {
        let steps: Vec<Step> = self.steps.iter().map(Step::normalized).collect();

        Self {
            id: self.id.clone(),
            name: if self.name.is_empty() {
                "Untitled".to_string()
            } else {
                self.name.clone()
            },
            kind: self.kind,
            instrument_id: self.instrument_id.clone(),
            device: self.device.clone(),
            steps: resize_steps(&steps, pattern_length.steps()),
            muted: self.muted,
            default_note: if self.default_note.is_empty() {
                self.kind.default_note().to_string()
            } else {
                self.default_note.clone()
            },
        }
    }

    /// Replace this track's step sequence with one resized to `new_len`
    pub fn resized(&self, new_len: usize) -> Self {
        Self {
            steps: resize_steps(&self.steps, new_len),
            ..self.clone()
        }
    }
}

impl Default for Track {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            kind: InstrumentKind::Lead,
            instrument_id: String::new(),
            device: None,
            steps: Vec::new(),
            muted: false,
            default_note: String::new(),
        }
    }
}

/// Build `count` fresh inactive steps
pub fn fresh_steps(count: usize) -> Vec<Step> {
    (0..count).map(|_| Step::inactive()).collect()
}

/// Resize a step sequence, preserving every step below the smaller length
///
/// Shrinking truncates from the tail; growing appends fresh inactive steps.
pub fn resize_steps(steps: &[Step], new_len: usize) -> Vec<Step> {
    if steps.len() == new_len {
        return steps.to_vec();
    }

    if steps.len() > new_len {
        return steps[..new_len].to_vec();
    }

    let mut resized = steps.to_vec();
    resized.extend(fresh_steps(new_len - steps.len()));
    resized
}
