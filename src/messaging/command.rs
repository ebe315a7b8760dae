// Trigger commands - what the built-in voices hand to the audio renderer

use crate::pattern::{InstrumentKind, InstrumentParams};

/// One note trigger for the external audio renderer
///
/// The engine never synthesizes sound; voices translate trigger events into
/// these commands and the renderer on the other side of the channel decides
/// what they sound like.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerCommand {
    /// Which instrument fired, for per-voice routing in the renderer
    pub instrument_id: String,
    pub kind: InstrumentKind,
    /// Note frequency in Hz, already resolved from the note name
    pub frequency: f32,
    /// Loudness, 0.0 to 1.0
    pub velocity: f32,
    /// Absolute schedule time of the trigger
    pub time: f64,
    /// Note duration in seconds
    pub duration: f64,
    /// Parameter block at trigger time
    pub params: InstrumentParams,
}
