// Cpal-backed scheduler - musical ticks derived from a real audio stream
// The stream outputs silence; its callback only advances the tick timeline.
// Acquiring the stream is the user-gated "audio resource" step.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};

use crate::pattern::{DEFAULT_BPM, StepLength, clamp_bpm};
use crate::sched::{ScheduleError, ScheduleHandle, ScheduleTime, TickCallback, TickScheduler};

struct TickParams {
    bpm: f64,
    subdivision: StepLength,
    next_tick: ScheduleTime,
    active: Option<u64>,
    next_handle: u64,
}

/// The shareable scheduling half: tick bookkeeping without the stream
///
/// cpal streams are not `Send` on every platform, so the stream itself stays
/// inside [`CpalDriver`] while this core is what the engine holds.
pub struct CpalScheduler {
    sample_pos: AtomicU64,
    sample_rate: f64,
    params: Mutex<TickParams>,
    // Separate from `params` so set_tempo from another thread never waits
    // behind a running tick callback
    callback: Mutex<Option<TickCallback>>,
}

impl CpalScheduler {
    fn new(sample_rate: f64) -> Self {
        Self {
            sample_pos: AtomicU64::new(0),
            sample_rate,
            params: Mutex::new(TickParams {
                bpm: DEFAULT_BPM,
                subdivision: StepLength::Sixteenth,
                next_tick: 0.0,
                active: None,
                next_handle: 1,
            }),
            callback: Mutex::new(None),
        }
    }

    /// Advance the timeline by one audio buffer and fire every due tick
    fn advance(&self, frames: u64) {
        let end_pos = self.sample_pos.fetch_add(frames, Ordering::Relaxed) + frames;
        let end_time = end_pos as f64 / self.sample_rate;

        loop {
            let due = {
                let Ok(mut params) = self.params.lock() else {
                    return;
                };
                if params.active.is_none() || params.next_tick > end_time {
                    return;
                }
                let due = params.next_tick;
                params.next_tick = due + params.subdivision.duration_secs(params.bpm);
                due
            };

            let Ok(mut callback) = self.callback.lock() else {
                return;
            };
            if let Some(callback) = callback.as_mut() {
                callback(due);
            }
        }
    }
}

impl TickScheduler for CpalScheduler {
    fn now(&self) -> ScheduleTime {
        self.sample_pos.load(Ordering::Relaxed) as f64 / self.sample_rate
    }

    fn schedule_repeating(
        &self,
        subdivision: StepLength,
        callback: TickCallback,
    ) -> Result<ScheduleHandle, ScheduleError> {
        let Ok(mut params) = self.params.lock() else {
            return Err(ScheduleError::ResourceUnavailable("state poisoned".into()));
        };
        if params.active.is_some() {
            return Err(ScheduleError::AlreadyScheduled);
        }

        let id = params.next_handle;
        params.next_handle += 1;
        params.active = Some(id);
        params.subdivision = subdivision;
        params.next_tick = self.now();
        drop(params);

        if let Ok(mut slot) = self.callback.lock() {
            *slot = Some(callback);
        }
        Ok(ScheduleHandle(id))
    }

    fn cancel(&self, handle: ScheduleHandle) {
        let Ok(mut params) = self.params.lock() else {
            return;
        };
        if params.active == Some(handle.0) {
            params.active = None;
            drop(params);
            // try_lock: the audio thread may be inside a tick right now; the
            // stale callback is replaced on the next schedule_repeating
            if let Ok(mut slot) = self.callback.try_lock() {
                *slot = None;
            }
        }
    }

    fn set_tempo(&self, bpm: f64) {
        if let Ok(mut params) = self.params.lock() {
            // Only the spacing of ticks after the already-committed one changes
            params.bpm = clamp_bpm(bpm);
        }
    }
}

/// Owns the audio output stream that drives a [`CpalScheduler`]
///
/// Construction acquires the default output device and starts the stream;
/// dropping the driver releases the resource and stops tick production.
pub struct CpalDriver {
    _stream: Stream,
    scheduler: Arc<CpalScheduler>,
    sample_rate: f64,
}

impl CpalDriver {
    /// Acquire the default audio output and start the silent stream
    pub fn new() -> Result<Self, ScheduleError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| ScheduleError::ResourceUnavailable("no output device".to_string()))?;

        let supported_config = device
            .default_output_config()
            .map_err(|e| ScheduleError::ResourceUnavailable(e.to_string()))?;
        let sample_format = supported_config.sample_format();
        let sample_rate = supported_config.sample_rate().0 as f64;
        let config: StreamConfig = supported_config.into();

        let scheduler = Arc::new(CpalScheduler::new(sample_rate));
        let core = Arc::clone(&scheduler);

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, core),
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, core),
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, core),
            other => Err(ScheduleError::ResourceUnavailable(format!(
                "unsupported sample format: {:?}",
                other
            ))),
        }?;

        stream
            .play()
            .map_err(|e| ScheduleError::ResourceUnavailable(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            scheduler,
            sample_rate,
        })
    }

    /// The shareable scheduler half, safe to hand to the engine
    pub fn scheduler(&self) -> Arc<CpalScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Sample rate of the acquired output device
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        scheduler: Arc<CpalScheduler>,
    ) -> Result<Stream, ScheduleError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let channels = config.channels as usize;

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // Silence out; this stream only exists to drive ticks
                    for sample in data.iter_mut() {
                        *sample = Sample::from_sample::<f32>(0.0);
                    }
                    let frames = data.len() / channels.max(1);
                    scheduler.advance(frames as u64);
                },
                |err| {
                    eprintln!("audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| ScheduleError::ResourceUnavailable(e.to_string()))?;

        Ok(stream)
    }
}
