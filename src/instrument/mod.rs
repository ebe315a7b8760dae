// Instruments - live handles behind the dispatch contract
// Descriptors live in the pattern snapshot; this module holds what they
// resolve to at trigger time

pub mod midi_out;
pub mod note;
pub mod voice;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::pattern::{Instrument, InstrumentKind, InstrumentParams};

pub use midi_out::{MidiOutError, MidiVoice};
pub use voice::{SharedTriggerProducer, SynthVoice};

/// A live, triggerable instrument
///
/// `trigger` must never panic and has nothing to return: whatever goes
/// wrong on the synthesis side is the instrument's concern, not the
/// engine's. One concrete implementation exists per instrument kind,
/// selected at construction time.
pub trait InstrumentHandle: Send + Sync {
    /// Fire one note at the given absolute schedule time
    fn trigger(&self, note: &str, duration: f64, time: f64, velocity: f64);

    /// Adopt a new parameter block for subsequent triggers
    fn apply_params(&self, params: &InstrumentParams);
}

/// Maps instrument ids to live handles
///
/// Returns `None` for instruments that are absent, disabled or not yet
/// constructed; the dispatch path skips those silently.
pub trait InstrumentResolver: Send + Sync {
    fn resolve(&self, instrument_id: &str) -> Option<Arc<dyn InstrumentHandle>>;
}

/// Build the concrete handle for a descriptor, selected by its kind
///
/// `Midi` voices come back unconnected; the owning layer picks the output
/// port (the track's `device`) and connects the voice itself.
pub fn build_handle(
    descriptor: &Instrument,
    commands: SharedTriggerProducer,
) -> Arc<dyn InstrumentHandle> {
    match descriptor.kind {
        InstrumentKind::Drum | InstrumentKind::Bass | InstrumentKind::Lead => {
            Arc::new(SynthVoice::new(descriptor, commands))
        }
        InstrumentKind::Midi => Arc::new(MidiVoice::new()),
    }
}

struct RackEntry {
    handle: Arc<dyn InstrumentHandle>,
    enabled: bool,
}

/// The default resolver: a registry of handles keyed by instrument id
///
/// Owned and kept in sync by the owning layer; the engine only ever calls
/// `resolve`.
pub struct InstrumentRack {
    entries: Mutex<HashMap<String, RackEntry>>,
}

impl InstrumentRack {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Build a rack with one handle per descriptor in `instruments`
    pub fn from_instruments(
        instruments: &[Instrument],
        commands: SharedTriggerProducer,
    ) -> Self {
        let rack = Self::new();
        for descriptor in instruments {
            rack.insert(
                &descriptor.id,
                build_handle(descriptor, Arc::clone(&commands)),
                descriptor.enabled,
            );
        }
        rack
    }

    pub fn insert(&self, instrument_id: &str, handle: Arc<dyn InstrumentHandle>, enabled: bool) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(instrument_id.to_string(), RackEntry { handle, enabled });
        }
    }

    pub fn remove(&self, instrument_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(instrument_id);
        }
    }

    /// Enable or disable without rebuilding the handle
    pub fn set_enabled(&self, instrument_id: &str, enabled: bool) {
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(entry) = entries.get_mut(instrument_id) {
                entry.enabled = enabled;
            }
        }
    }

    /// Forward a descriptor's parameter block to its live handle
    pub fn apply_params(&self, instrument_id: &str, params: &InstrumentParams) {
        if let Ok(entries) = self.entries.lock() {
            if let Some(entry) = entries.get(instrument_id) {
                entry.handle.apply_params(params);
            }
        }
    }
}

impl Default for InstrumentRack {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentResolver for InstrumentRack {
    fn resolve(&self, instrument_id: &str) -> Option<Arc<dyn InstrumentHandle>> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(instrument_id)?;
        entry.enabled.then(|| Arc::clone(&entry.handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::channels::create_trigger_channel;
    use ringbuf::traits::Consumer;

    fn shared_producer() -> (SharedTriggerProducer, crate::messaging::TriggerConsumer) {
        let (tx, rx) = create_trigger_channel(16);
        (Arc::new(Mutex::new(tx)), rx)
    }

    #[test]
    fn test_rack_resolves_enabled_instruments() {
        let (tx, _rx) = shared_producer();
        let drums = Instrument::new(InstrumentKind::Drum, "Drums");
        let rack = InstrumentRack::from_instruments(std::slice::from_ref(&drums), tx);

        assert!(rack.resolve(&drums.id).is_some());
        assert!(rack.resolve("instrument-unknown").is_none());
    }

    #[test]
    fn test_disabled_instrument_resolves_to_none() {
        let (tx, _rx) = shared_producer();
        let mut lead = Instrument::new(InstrumentKind::Lead, "Lead");
        lead.enabled = false;
        let rack = InstrumentRack::from_instruments(std::slice::from_ref(&lead), tx);

        assert!(rack.resolve(&lead.id).is_none());

        rack.set_enabled(&lead.id, true);
        assert!(rack.resolve(&lead.id).is_some());
    }

    #[test]
    fn test_remove_unregisters_handle() {
        let (tx, _rx) = shared_producer();
        let bass = Instrument::new(InstrumentKind::Bass, "Bass");
        let rack = InstrumentRack::from_instruments(std::slice::from_ref(&bass), tx);

        rack.remove(&bass.id);
        assert!(rack.resolve(&bass.id).is_none());
    }

    #[test]
    fn test_build_handle_selects_by_kind() {
        let (tx, mut rx) = shared_producer();

        let lead = Instrument::new(InstrumentKind::Lead, "Lead");
        let handle = build_handle(&lead, Arc::clone(&tx));
        handle.trigger("C4", 0.125, 0.0, 1.0);
        // Synth kinds emit renderer commands
        assert!(rx.try_pop().is_some());

        let midi = Instrument::new(InstrumentKind::Midi, "Controller");
        let handle = build_handle(&midi, tx);
        handle.trigger("C4", 0.125, 0.0, 1.0);
        // Midi kinds route to the (unconnected) port instead
        assert!(rx.try_pop().is_none());
    }

    #[test]
    fn test_apply_params_forwards_to_handle() {
        let (tx, mut rx) = shared_producer();
        let lead = Instrument::new(InstrumentKind::Lead, "Lead");
        let rack = InstrumentRack::from_instruments(std::slice::from_ref(&lead), tx);

        let mut params = InstrumentParams::default();
        params.volume = 0.25;
        rack.apply_params(&lead.id, &params);

        rack.resolve(&lead.id)
            .expect("resolvable")
            .trigger("C4", 0.125, 0.0, 1.0);
        assert_eq!(rx.try_pop().unwrap().params.volume, 0.25);
    }
}
