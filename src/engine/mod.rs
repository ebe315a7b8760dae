// Engine - the pattern playback facade
// Wires the transport clock, step evaluator, instrument resolution and
// playhead publication around one atomically swapped project snapshot

pub mod clock;
pub mod evaluator;
pub mod playhead;
pub mod rng;

use std::sync::{Arc, Mutex};

use crate::engine::clock::{StartError, TransportClock, TransportState};
use crate::engine::evaluator::evaluate_step;
use crate::engine::playhead::{Playhead, StepObserver};
use crate::engine::rng::{EntropyRng, GateRng};
use crate::instrument::InstrumentResolver;
use crate::pattern::{PatternLength, Project, Track, clamp_bpm};
use crate::sched::{ScheduleTime, TickScheduler};

/// Single mutable slot holding the current project snapshot
///
/// The owning layer replaces the whole snapshot on every edit; the tick
/// handler loads the latest reference at the start of each tick, so edits
/// land between ticks and a tick never observes a half-applied change.
pub struct SnapshotSlot {
    inner: Mutex<Arc<Project>>,
}

impl SnapshotSlot {
    pub fn new(project: Project) -> Self {
        Self {
            inner: Mutex::new(Arc::new(project)),
        }
    }

    /// The latest snapshot reference
    pub fn load(&self) -> Arc<Project> {
        match self.inner.lock() {
            Ok(slot) => Arc::clone(&slot),
            // A poisoned slot still holds a valid snapshot
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the snapshot wholesale
    pub fn replace(&self, project: Project) {
        let next = Arc::new(project);
        match self.inner.lock() {
            Ok(mut slot) => *slot = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

/// Everything the tick handler touches, shared with the scheduler thread
struct EngineShared {
    snapshot: SnapshotSlot,
    resolver: Mutex<Option<Arc<dyn InstrumentResolver>>>,
    rng: Mutex<Box<dyn GateRng>>,
    playhead: Playhead,
}

impl EngineShared {
    /// One tick: evaluate every track against the latest snapshot, dispatch
    /// resolved triggers, publish and advance the playhead
    ///
    /// Runs on the scheduler's thread; must return promptly and never panic.
    fn handle_tick(&self, time: ScheduleTime) {
        let project = self.snapshot.load();
        let pattern_length = project.pattern_length.steps();
        let step = self.playhead.counter() % pattern_length;

        let triggered = match self.rng.lock() {
            Ok(mut rng) => evaluate_step(&project, step, time, rng.as_mut()),
            Err(_) => Vec::new(),
        };

        if !triggered.is_empty() {
            let resolver = self.resolver.lock().ok().and_then(|slot| slot.clone());
            if let Some(resolver) = resolver {
                for track in &triggered {
                    // Absent or disabled instruments drop the computed
                    // events silently; that is the contract, not an error
                    let Some(handle) = resolver.resolve(&track.instrument_id) else {
                        continue;
                    };
                    for event in &track.events {
                        handle.trigger(&event.note, event.duration, event.time, event.velocity);
                    }
                }
            }
        }

        self.playhead.publish_and_advance(step, pattern_length);
    }
}

/// The pattern playback engine
///
/// Owns no sound and no UI: instruments are reached through the injected
/// resolver, ticks through the injected scheduler, and the project snapshot
/// belongs to the caller, handed over whole on every edit.
pub struct Engine {
    shared: Arc<EngineShared>,
    clock: TransportClock,
}

impl Engine {
    pub fn new(project: Project) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                snapshot: SnapshotSlot::new(project),
                resolver: Mutex::new(None),
                rng: Mutex::new(Box::new(EntropyRng::new())),
                playhead: Playhead::new(),
            }),
            clock: TransportClock::new(),
        }
    }

    /// The latest snapshot reference
    pub fn project(&self) -> Arc<Project> {
        self.shared.snapshot.load()
    }

    /// Replace the whole project snapshot
    pub fn replace_project(&self, project: Project) {
        let bpm = project.bpm;
        self.shared.snapshot.replace(project);
        if let Some(scheduler) = self.clock.scheduler() {
            scheduler.set_tempo(bpm);
        }
    }

    /// Replace the track list wholesale
    pub fn set_tracks(&self, tracks: Vec<Track>) {
        let current = self.shared.snapshot.load();
        self.shared.snapshot.replace(Project {
            tracks,
            ..(*current).clone()
        });
    }

    /// Change the pattern length, resizing every track to match
    pub fn set_pattern_length(&self, pattern_length: PatternLength) {
        let current = self.shared.snapshot.load();
        let tracks = current
            .tracks
            .iter()
            .map(|track| track.resized(pattern_length.steps()))
            .collect();
        self.shared.snapshot.replace(Project {
            pattern_length,
            tracks,
            ..(*current).clone()
        });
    }

    /// Change the tempo; future tick spacing only
    pub fn set_tempo(&self, bpm: f64) {
        let bpm = clamp_bpm(bpm);
        let current = self.shared.snapshot.load();
        self.shared.snapshot.replace(Project {
            bpm,
            ..(*current).clone()
        });
        if let Some(scheduler) = self.clock.scheduler() {
            scheduler.set_tempo(bpm);
        }
    }

    /// Install the instrument resolution function
    pub fn set_resolver(&self, resolver: Arc<dyn InstrumentResolver>) {
        if let Ok(mut slot) = self.shared.resolver.lock() {
            *slot = Some(resolver);
        }
    }

    /// Replace the stochastic gate's random source
    pub fn set_gate_rng(&self, rng: Box<dyn GateRng>) {
        if let Ok(mut slot) = self.shared.rng.lock() {
            *slot = rng;
        }
    }

    /// Register a playhead observer
    pub fn on_step(&self, observer: StepObserver) {
        self.shared.playhead.add_observer(observer);
    }

    /// Last published playhead position
    pub fn current_step(&self) -> usize {
        self.shared.playhead.current_step()
    }

    pub fn transport_state(&self) -> TransportState {
        self.clock.state()
    }

    /// Start playback on the given scheduling resource
    ///
    /// No-op when already starting or running. On failure the engine stays
    /// stopped and the scheduler error is returned.
    pub fn start(&self, scheduler: Arc<dyn TickScheduler>) -> Result<(), StartError> {
        scheduler.set_tempo(self.shared.snapshot.load().bpm);
        let shared = Arc::clone(&self.shared);
        self.clock
            .start(scheduler, move |time| shared.handle_tick(time))
    }

    /// Stop playback at the next tick boundary and rewind the playhead
    ///
    /// Idempotent; publishes step 0 before returning. Sub-events already
    /// handed to instruments are allowed to fire.
    pub fn stop(&self) {
        self.clock.stop();
        self.shared.playhead.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rng::ScriptedRng;
    use crate::instrument::InstrumentHandle;
    use crate::pattern::{InstrumentParams, Step};
    use crate::sched::ManualScheduler;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Fired {
        note: String,
        duration: f64,
        time: f64,
        velocity: f64,
    }

    struct RecordingHandle {
        fired: Arc<StdMutex<Vec<Fired>>>,
    }

    impl InstrumentHandle for RecordingHandle {
        fn trigger(&self, note: &str, duration: f64, time: f64, velocity: f64) {
            self.fired.lock().unwrap().push(Fired {
                note: note.to_string(),
                duration,
                time,
                velocity,
            });
        }

        fn apply_params(&self, _params: &InstrumentParams) {}
    }

    struct SingleResolver {
        id: String,
        handle: Arc<dyn InstrumentHandle>,
    }

    impl InstrumentResolver for SingleResolver {
        fn resolve(&self, instrument_id: &str) -> Option<Arc<dyn InstrumentHandle>> {
            (instrument_id == self.id).then(|| Arc::clone(&self.handle))
        }
    }

    fn engine_with_recorder(project: Project) -> (Engine, Arc<StdMutex<Vec<Fired>>>) {
        let fired = Arc::new(StdMutex::new(Vec::new()));
        let instrument_id = project.instruments[0].id.clone();
        let engine = Engine::new(project);
        engine.set_resolver(Arc::new(SingleResolver {
            id: instrument_id,
            handle: Arc::new(RecordingHandle {
                fired: Arc::clone(&fired),
            }),
        }));
        (engine, fired)
    }

    fn project_with_first_step_active() -> Project {
        let mut project = Project::with_default_setup();
        project.tracks.truncate(1);
        project.instruments.truncate(1);
        project.tracks[0].steps[0] = Step {
            active: true,
            velocity: 0.8,
            ..Step::inactive()
        };
        project
    }

    #[test]
    fn test_tick_dispatches_to_resolved_instrument() {
        let (engine, fired) = engine_with_recorder(project_with_first_step_active());
        let scheduler = Arc::new(ManualScheduler::new());

        engine.start(scheduler.clone()).unwrap();
        scheduler.advance_ticks(1);

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(
            fired[0],
            Fired {
                note: "C2".to_string(),
                duration: 0.125,
                time: 0.0,
                velocity: 0.8,
            }
        );
    }

    #[test]
    fn test_unresolved_instrument_drops_silently() {
        let mut project = project_with_first_step_active();
        project.tracks[0].instrument_id = "instrument-gone".to_string();
        let (engine, fired) = engine_with_recorder(project);
        let scheduler = Arc::new(ManualScheduler::new());

        engine.start(scheduler.clone()).unwrap();
        scheduler.advance_ticks(16);

        assert!(fired.lock().unwrap().is_empty());
        // The playhead still advanced normally
        assert_eq!(engine.current_step(), 15);
    }

    #[test]
    fn test_no_resolver_installed_is_tolerated() {
        let engine = Engine::new(project_with_first_step_active());
        let scheduler = Arc::new(ManualScheduler::new());

        engine.start(scheduler.clone()).unwrap();
        scheduler.advance_ticks(3);
        assert_eq!(engine.current_step(), 2);
    }

    #[test]
    fn test_edit_lands_between_ticks() {
        let (engine, fired) = engine_with_recorder(project_with_first_step_active());
        let scheduler = Arc::new(ManualScheduler::new());

        engine.start(scheduler.clone()).unwrap();
        scheduler.advance_ticks(1);
        assert_eq!(fired.lock().unwrap().len(), 1);

        // Deactivate the step mid-playback; the next loop pass sees it
        let mut tracks = engine.project().tracks.clone();
        tracks[0].steps[0].active = false;
        engine.set_tracks(tracks);

        scheduler.advance_ticks(16);
        assert_eq!(fired.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_set_pattern_length_resizes_tracks() {
        let engine = Engine::new(Project::with_default_setup());

        engine.set_pattern_length(PatternLength::SixtyFour);
        let project = engine.project();
        assert_eq!(project.pattern_length, PatternLength::SixtyFour);
        for track in &project.tracks {
            assert_eq!(track.steps.len(), 64);
        }

        engine.set_pattern_length(PatternLength::Eight);
        let project = engine.project();
        for track in &project.tracks {
            assert_eq!(track.steps.len(), 8);
        }
    }

    #[test]
    fn test_set_tempo_clamps_and_updates_snapshot() {
        let engine = Engine::new(Project::with_default_setup());

        engine.set_tempo(140.0);
        assert_eq!(engine.project().bpm, 140.0);

        engine.set_tempo(10_000.0);
        assert_eq!(engine.project().bpm, crate::pattern::MAX_BPM);
    }

    #[test]
    fn test_stop_rewinds_and_publishes_zero() {
        let (engine, _fired) = engine_with_recorder(project_with_first_step_active());
        let scheduler = Arc::new(ManualScheduler::new());

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.on_step(Box::new(move |step| sink.lock().unwrap().push(step)));

        engine.start(scheduler.clone()).unwrap();
        scheduler.advance_ticks(5);
        engine.stop();
        engine.stop();

        assert_eq!(engine.current_step(), 0);
        assert_eq!(engine.transport_state(), TransportState::Stopped);
        let seen = seen.lock().unwrap();
        // Steps 0..=4 then 0 published by each stop
        assert_eq!(*seen, vec![0, 1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn test_scripted_gate_controls_firing() {
        let mut project = project_with_first_step_active();
        project.tracks[0].steps[0].probability = 0.5;
        let (engine, fired) = engine_with_recorder(project);
        engine.set_gate_rng(Box::new(ScriptedRng::new(vec![0.9, 0.1])));

        let scheduler = Arc::new(ManualScheduler::new());
        engine.start(scheduler.clone()).unwrap();

        // First pass: draw 0.9 > 0.5 skips; second pass: 0.1 <= 0.5 fires
        scheduler.advance_ticks(16);
        assert_eq!(fired.lock().unwrap().len(), 0);
        scheduler.advance_ticks(16);
        assert_eq!(fired.lock().unwrap().len(), 1);
    }
}
