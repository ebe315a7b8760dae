// MIDI output voice - external-controller instrument over midir
// A worker thread owns the port connection and paces note-on/note-off pairs

use std::sync::mpsc::{Sender, channel};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use midir::MidiOutput;

use crate::instrument::InstrumentHandle;
use crate::instrument::note;
use crate::pattern::InstrumentParams;
use crate::sched::TickScheduler;

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

/// Errors raised while opening a MIDI output port
#[derive(Debug, thiserror::Error)]
pub enum MidiOutError {
    #[error("MIDI init error: {0}")]
    Init(#[from] midir::InitError),

    #[error("MIDI port not found: {0}")]
    PortNotFound(String),

    #[error("MIDI connect error: {0}")]
    Connect(String),
}

struct OutgoingNote {
    number: u8,
    velocity: u8,
    deadline: Instant,
    duration: Duration,
}

/// An external-controller voice
///
/// Triggers are queued to a worker thread which sleeps until each note's
/// deadline, sends note-on, holds for the duration and sends note-off.
/// Unconnected voices drop triggers silently, mirroring a track whose
/// device is not picked yet. Notes already queued when the voice
/// disconnects still play out.
pub struct MidiVoice {
    queue: Mutex<Option<Sender<OutgoingNote>>>,
    // Maps schedule time to wall clock for ahead-of-now triggers
    timebase: Mutex<Option<Arc<dyn TickScheduler>>>,
}

impl MidiVoice {
    /// Create an unconnected voice
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(None),
            timebase: Mutex::new(None),
        }
    }

    /// Use `scheduler` to convert trigger times into wall-clock deadlines
    ///
    /// Without a timebase every trigger is sent immediately.
    pub fn set_timebase(&self, scheduler: Arc<dyn TickScheduler>) {
        if let Ok(mut slot) = self.timebase.lock() {
            *slot = Some(scheduler);
        }
    }

    /// Open the named output port and start the worker thread
    pub fn connect(&self, port_name: &str) -> Result<(), MidiOutError> {
        let midi_out = MidiOutput::new("gridbeat output")?;

        let port = midi_out
            .ports()
            .into_iter()
            .find(|port| {
                midi_out
                    .port_name(port)
                    .map(|name| name == port_name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| MidiOutError::PortNotFound(port_name.to_string()))?;

        let mut connection = midi_out
            .connect(&port, "gridbeat")
            .map_err(|e| MidiOutError::Connect(e.to_string()))?;

        let (tx, rx) = channel::<OutgoingNote>();
        thread::spawn(move || {
            // Ends when the voice disconnects and the queue drains
            for outgoing in rx {
                let now = Instant::now();
                if outgoing.deadline > now {
                    thread::sleep(outgoing.deadline - now);
                }
                let _ = connection.send(&[NOTE_ON, outgoing.number, outgoing.velocity]);
                thread::sleep(outgoing.duration);
                let _ = connection.send(&[NOTE_OFF, outgoing.number, 0]);
            }
        });

        if let Ok(mut slot) = self.queue.lock() {
            *slot = Some(tx);
        }
        Ok(())
    }

    /// Drop the queue sender; the worker finishes queued notes and exits
    pub fn disconnect(&self) {
        if let Ok(mut slot) = self.queue.lock() {
            *slot = None;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.queue
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    fn deadline_for(&self, time: f64) -> Instant {
        let now = Instant::now();
        let lead = self
            .timebase
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|scheduler| time - scheduler.now()))
            .unwrap_or(0.0);
        if lead > 0.0 {
            now + Duration::from_secs_f64(lead)
        } else {
            now
        }
    }
}

impl Default for MidiVoice {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentHandle for MidiVoice {
    fn trigger(&self, note_name: &str, duration: f64, time: f64, velocity: f64) {
        let Some(number) = note::midi_number(note_name) else {
            return;
        };

        let Ok(queue) = self.queue.lock() else {
            return;
        };
        let Some(queue) = queue.as_ref() else {
            return;
        };

        let velocity = (velocity.clamp(0.0, 1.0) * 127.0).round() as u8;
        let _ = queue.send(OutgoingNote {
            number,
            velocity,
            deadline: self.deadline_for(time),
            duration: Duration::from_secs_f64(duration.max(0.0)),
        });
    }

    /// External hardware owns its own sound; the block is ignored
    fn apply_params(&self, _params: &InstrumentParams) {}
}
