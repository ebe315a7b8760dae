// Synth voice - command-emitting handle for the built-in instrument kinds
// Translates trigger events into TriggerCommands; synthesis happens in the
// external renderer on the consuming end of the channel

use std::sync::{Arc, Mutex};

use crate::instrument::note;
use crate::instrument::InstrumentHandle;
use crate::messaging::channels::TriggerProducer;
use crate::messaging::command::TriggerCommand;
use crate::pattern::{Instrument, InstrumentKind, InstrumentParams, clamp_unit};

use ringbuf::traits::Producer;

/// Trigger producer shared between every voice of one rack
pub type SharedTriggerProducer = Arc<Mutex<TriggerProducer>>;

/// A drum, bass or lead voice
///
/// Holds the descriptor's parameter block and forwards each trigger as a
/// [`TriggerCommand`]. Unresolvable note names and a full command buffer
/// both drop the trigger silently; neither is the engine's error.
pub struct SynthVoice {
    instrument_id: String,
    kind: InstrumentKind,
    params: Mutex<InstrumentParams>,
    commands: SharedTriggerProducer,
}

impl SynthVoice {
    pub fn new(descriptor: &Instrument, commands: SharedTriggerProducer) -> Self {
        Self {
            instrument_id: descriptor.id.clone(),
            kind: descriptor.kind,
            params: Mutex::new(descriptor.params.clamped()),
            commands,
        }
    }

    /// Current parameter block
    pub fn params(&self) -> InstrumentParams {
        self.params
            .lock()
            .map(|params| *params)
            .unwrap_or_default()
    }
}

impl InstrumentHandle for SynthVoice {
    fn trigger(&self, note_name: &str, duration: f64, time: f64, velocity: f64) {
        let Some(frequency) = note::frequency(note_name) else {
            return;
        };

        let command = TriggerCommand {
            instrument_id: self.instrument_id.clone(),
            kind: self.kind,
            frequency,
            velocity: clamp_unit(velocity) as f32,
            time,
            duration,
            params: self.params(),
        };

        if let Ok(mut commands) = self.commands.lock() {
            let _ = commands.try_push(command);
        }
    }

    fn apply_params(&self, params: &InstrumentParams) {
        if let Ok(mut slot) = self.params.lock() {
            *slot = params.clamped();
        }
    }
}
