// Step evaluator - decides, per track, whether and how a step fires
// Pure functions over one immutable snapshot; no instrument or clock state

use crate::engine::rng::GateRng;
use crate::pattern::{Project, Track, clamp_unit};

/// One trigger handed to an instrument
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEvent {
    /// Note name, e.g. "C2"; interpretation is the instrument's concern
    pub note: String,
    /// Loudness, 0.0 to 1.0
    pub velocity: f64,
    /// Absolute schedule time of the trigger
    pub time: f64,
    /// Note duration in seconds
    pub duration: f64,
}

/// Everything one track fires at one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TrackTriggers {
    pub track_id: String,
    pub instrument_id: String,
    /// Ratchet sub-events in ascending time order
    pub events: Vec<TriggerEvent>,
}

/// Evaluate one tick against a snapshot, in track order
///
/// `step_index` is the wrapped playhead position; `tick_time` the tick's
/// absolute schedule time. Instrument resolution happens afterwards in the
/// dispatch path, so a track with no resolvable instrument still evaluates
/// here and is dropped later.
pub fn evaluate_step(
    project: &Project,
    step_index: usize,
    tick_time: f64,
    rng: &mut dyn GateRng,
) -> Vec<TrackTriggers> {
    let mut triggered = Vec::new();

    for track in &project.tracks {
        let events = evaluate_track(track, project.bpm, step_index, tick_time, rng);
        if !events.is_empty() {
            triggered.push(TrackTriggers {
                track_id: track.id.clone(),
                instrument_id: track.instrument_id.clone(),
                events,
            });
        }
    }

    triggered
}

/// Evaluate one track at one tick
///
/// Mute is checked first as a hard veto, so neither the gate rng nor the
/// ratchet math runs for muted tracks. The stochastic gate and ratcheting
/// compose independently: the gate decides *whether* the step fires, the
/// ratchet only decides *how many* sub-events that one decision produces.
pub fn evaluate_track(
    track: &Track,
    bpm: f64,
    step_index: usize,
    tick_time: f64,
    rng: &mut dyn GateRng,
) -> Vec<TriggerEvent> {
    if track.muted {
        return Vec::new();
    }

    let Some(step) = track.steps.get(step_index) else {
        // Tolerate a momentarily short step vector; normalization keeps
        // lengths in sync everywhere else
        return Vec::new();
    };
    if !step.active {
        return Vec::new();
    }

    if !gate_passes(step.probability, rng) {
        return Vec::new();
    }

    let note = step.note.as_deref().unwrap_or(&track.default_note);
    let velocity = clamp_unit(step.velocity);
    let fire_time = tick_time + step.microtiming;
    let duration = step.length.duration_secs(bpm);

    let ratchets = step.ratchet.max(1) as usize;
    let slice = duration / ratchets as f64;

    let mut events = Vec::with_capacity(ratchets);
    for k in 0..ratchets {
        events.push(TriggerEvent {
            note: note.to_string(),
            velocity,
            time: fire_time + k as f64 * slice,
            duration: slice,
        });
    }
    events
}

/// Stochastic gate: does this visit of the step fire?
///
/// The boundary probabilities bypass the draw entirely so that 1.0 always
/// fires and 0.0 never fires, deterministically.
fn gate_passes(probability: f64, rng: &mut dyn GateRng) -> bool {
    if probability >= 1.0 {
        return true;
    }
    if probability <= 0.0 {
        return false;
    }
    rng.next_unit() <= probability
}
