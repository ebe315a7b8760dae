// Project - The immutable snapshot read by the playback engine
// Aggregates tempo, pattern length, tracks and instrument descriptors

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::pattern::track::Track;

/// Supported tempo range in BPM
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 999.0;
pub const DEFAULT_BPM: f64 = 120.0;

/// Clamp a tempo into the supported range, defaulting non-finite input
pub fn clamp_bpm(bpm: f64) -> f64 {
    if bpm.is_finite() && bpm > 0.0 {
        bpm.clamp(MIN_BPM, MAX_BPM)
    } else {
        DEFAULT_BPM
    }
}

/// Kind of sound a track or instrument produces
///
/// `Midi` routes triggers to an external controller instead of the
/// built-in renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Drum,
    Bass,
    Lead,
    Midi,
}

impl InstrumentKind {
    /// Note used by tracks of this kind when a step has no override
    pub fn default_note(&self) -> &'static str {
        match self {
            InstrumentKind::Drum | InstrumentKind::Bass => "C2",
            InstrumentKind::Lead | InstrumentKind::Midi => "C4",
        }
    }

    /// Factory parameters for a freshly created instrument of this kind
    pub fn default_params(&self) -> InstrumentParams {
        let params = InstrumentParams::default();
        match self {
            InstrumentKind::Bass => InstrumentParams {
                oscillator: Waveform::Square,
                ..params
            },
            _ => params,
        }
    }
}

impl Default for InstrumentKind {
    fn default() -> Self {
        InstrumentKind::Lead
    }
}

/// Oscillator shape for the built-in voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl Default for Waveform {
    fn default() -> Self {
        Waveform::Sine
    }
}

/// Synth-style parameter block shared by every instrument kind
///
/// Envelope times are in seconds. External-controller instruments carry the
/// block for uniformity but ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentParams {
    /// Output level, 0.0 to 1.0
    pub volume: f32,
    /// Stereo position, -1.0 left to 1.0 right
    pub pan: f32,
    /// Envelope attack time
    pub attack: f32,
    /// Envelope decay time
    pub decay: f32,
    /// Envelope sustain level, 0.0 to 1.0
    pub sustain: f32,
    /// Envelope release time
    pub release: f32,
    /// Oscillator shape
    pub oscillator: Waveform,
}

impl InstrumentParams {
    /// Clamp every field into its documented range
    pub fn clamped(&self) -> Self {
        Self {
            volume: self.volume.clamp(0.0, 1.0),
            pan: self.pan.clamp(-1.0, 1.0),
            attack: self.attack.clamp(0.001, 5.0),
            decay: self.decay.clamp(0.001, 5.0),
            sustain: self.sustain.clamp(0.0, 1.0),
            release: self.release.clamp(0.001, 5.0),
            oscillator: self.oscillator,
        }
    }
}

impl Default for InstrumentParams {
    fn default() -> Self {
        Self {
            volume: 0.8,
            pan: 0.0,
            attack: 0.1,
            decay: 0.2,
            sustain: 0.6,
            release: 0.4,
            oscillator: Waveform::Sine,
        }
    }
}

/// Instrument descriptor - data only
///
/// The live, sound-producing counterpart is resolved separately at dispatch
/// time; a snapshot never holds instrument handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Instrument {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: InstrumentKind,
    /// Opaque preset reference owned by the preset library
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_id: Option<String>,
    pub params: InstrumentParams,
    /// Disabled instruments resolve to no handle and are skipped silently
    pub enabled: bool,
}

impl Instrument {
    /// Create an enabled instrument with factory parameters for its kind
    pub fn new(kind: InstrumentKind, name: impl Into<String>) -> Self {
        Self {
            id: super::generate_id("instrument"),
            name: name.into(),
            kind,
            preset_id: None,
            params: kind.default_params(),
            enabled: true,
        }
    }

    /// Repair an instrument loaded from an untrusted snapshot payload
    pub fn normalized(&self) -> Self {
        Self {
            id: if self.id.is_empty() {
                super::generate_id("instrument")
            } else {
                self.id.clone()
            },
            name: if self.name.is_empty() {
                default_voice_name(self.kind)
            } else {
                self.name.clone()
            },
            kind: self.kind,
            preset_id: self.preset_id.clone(),
            params: self.params.clamped(),
            enabled: self.enabled,
        }
    }
}

impl Default for Instrument {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            kind: InstrumentKind::default(),
            preset_id: None,
            params: InstrumentParams::default(),
            enabled: true,
        }
    }
}

fn default_voice_name(kind: InstrumentKind) -> String {
    let tag = match kind {
        InstrumentKind::Drum => "DRUM",
        InstrumentKind::Bass => "BASS",
        InstrumentKind::Lead => "LEAD",
        InstrumentKind::Midi => "MIDI",
    };
    format!("{} Voice", tag)
}

/// Number of steps in one loop cycle
///
/// Serialized as the bare step count; any unsupported count coerces to 16
/// rather than rejecting the whole snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub enum PatternLength {
    Eight,
    Sixteen,
    ThirtyTwo,
    SixtyFour,
}

impl PatternLength {
    pub const ALL: [PatternLength; 4] = [
        PatternLength::Eight,
        PatternLength::Sixteen,
        PatternLength::ThirtyTwo,
        PatternLength::SixtyFour,
    ];

    /// Step count of this pattern length
    pub fn steps(&self) -> usize {
        match self {
            PatternLength::Eight => 8,
            PatternLength::Sixteen => 16,
            PatternLength::ThirtyTwo => 32,
            PatternLength::SixtyFour => 64,
        }
    }

    /// Exact conversion from a step count
    pub fn from_steps(steps: usize) -> Option<Self> {
        match steps {
            8 => Some(PatternLength::Eight),
            16 => Some(PatternLength::Sixteen),
            32 => Some(PatternLength::ThirtyTwo),
            64 => Some(PatternLength::SixtyFour),
            _ => None,
        }
    }
}

impl Default for PatternLength {
    fn default() -> Self {
        PatternLength::Sixteen
    }
}

impl From<u64> for PatternLength {
    fn from(steps: u64) -> Self {
        usize::try_from(steps)
            .ok()
            .and_then(PatternLength::from_steps)
            .unwrap_or_default()
    }
}

impl From<PatternLength> for u64 {
    fn from(length: PatternLength) -> Self {
        length.steps() as u64
    }
}

/// Errors raised while decoding a project snapshot payload
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid project payload: {0}")]
    InvalidPayload(&'static str),
}

/// A whole project snapshot
///
/// Snapshots are replaced wholesale on every edit and read immutably by the
/// engine once per tick; nothing mutates one in place after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub bpm: f64,
    /// Carried through snapshots for the editor; playback ticks at a fixed
    /// sixteenth-note subdivision regardless
    pub time_signature: [u8; 2],
    pub pattern_length: PatternLength,
    pub tracks: Vec<Track>,
    pub instruments: Vec<Instrument>,
}

impl Project {
    /// Create the factory default project: drum, bass and lead voices with
    /// one empty 16-step track each at 120 BPM
    pub fn with_default_setup() -> Self {
        let pattern_length = PatternLength::Sixteen;
        let drums = Instrument::new(InstrumentKind::Drum, "Drums");
        let bass = Instrument::new(InstrumentKind::Bass, "Bass");
        let lead = Instrument::new(InstrumentKind::Lead, "Lead");

        Self {
            id: super::generate_id("project"),
            name: "New Project".to_string(),
            bpm: DEFAULT_BPM,
            time_signature: [4, 4],
            pattern_length,
            tracks: vec![
                Track::for_instrument(pattern_length, &drums),
                Track::for_instrument(pattern_length, &bass),
                Track::for_instrument(pattern_length, &lead),
            ],
            instruments: vec![drums, bass, lead],
        }
    }

    /// Decode a snapshot from its JSON wire shape
    ///
    /// Rejects structurally invalid payloads before they can reach the
    /// engine; individual out-of-range fields are repaired, not rejected.
    pub fn from_json(payload: &str) -> Result<Self, SnapshotError> {
        let value: serde_json::Value = serde_json::from_str(payload)?;

        let object = value
            .as_object()
            .ok_or(SnapshotError::InvalidPayload("not a JSON object"))?;
        if !object.contains_key("tracks") {
            return Err(SnapshotError::InvalidPayload("missing tracks"));
        }
        if !object.contains_key("patternLength") {
            return Err(SnapshotError::InvalidPayload("missing patternLength"));
        }

        let project: Project = serde_json::from_value(value)?;
        Ok(project.normalized())
    }

    /// Encode this snapshot into its JSON wire shape
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Repair a snapshot into one the engine can trust
    ///
    /// Clamps every numeric field, resizes every track to the pattern
    /// length and synthesizes a fallback instrument for any track whose
    /// reference does not resolve, rewriting the reference to match.
    pub fn normalized(&self) -> Self {
        let mut instruments: Vec<Instrument> =
            self.instruments.iter().map(Instrument::normalized).collect();
        let mut known: HashSet<String> = instruments.iter().map(|i| i.id.clone()).collect();

        let tracks: Vec<Track> = self
            .tracks
            .iter()
            .map(|track| {
                let mut track = track.normalized(self.pattern_length);
                if !known.contains(&track.instrument_id) {
                    let fallback = derive_fallback_instrument(&track);
                    track.instrument_id = fallback.id.clone();
                    known.insert(fallback.id.clone());
                    instruments.push(fallback);
                }
                track
            })
            .collect();

        Self {
            id: if self.id.is_empty() {
                super::generate_id("project")
            } else {
                self.id.clone()
            },
            name: if self.name.is_empty() {
                "Untitled Project".to_string()
            } else {
                self.name.clone()
            },
            bpm: clamp_bpm(self.bpm),
            time_signature: self.time_signature,
            pattern_length: self.pattern_length,
            tracks,
            instruments,
        }
    }

    /// Look up an instrument descriptor by id
    pub fn instrument(&self, id: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id == id)
    }
}

impl Default for Project {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            bpm: DEFAULT_BPM,
            time_signature: [4, 4],
            pattern_length: PatternLength::default(),
            tracks: Vec::new(),
            instruments: Vec::new(),
        }
    }
}

/// Build a replacement instrument for a track whose reference is dangling
///
/// Keeps the dangling id when the track carried one so other tracks sharing
/// the same stale reference converge on a single fallback.
fn derive_fallback_instrument(track: &Track) -> Instrument {
    let mut fallback = Instrument::new(track.kind, track.name.clone());
    if !track.instrument_id.is_empty() {
        fallback.id = track.instrument_id.clone();
    }
    fallback
}
