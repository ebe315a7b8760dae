// Communication channels lock-free

use std::sync::Mutex;

use ringbuf::traits::Producer;
use ringbuf::{HeapRb, traits::Split};

use crate::engine::playhead::StepObserver;
use crate::messaging::command::TriggerCommand;

pub type TriggerProducer = ringbuf::HeapProd<TriggerCommand>;
pub type TriggerConsumer = ringbuf::HeapCons<TriggerCommand>;

/// Channel carrying trigger commands from the voices to the audio renderer
pub fn create_trigger_channel(capacity: usize) -> (TriggerProducer, TriggerConsumer) {
    let rb = HeapRb::<TriggerCommand>::new(capacity);
    rb.split()
}

pub type PlayheadProducer = ringbuf::HeapProd<usize>;
pub type PlayheadConsumer = ringbuf::HeapCons<usize>;

/// Channel carrying playhead positions to a polling UI
pub fn create_playhead_channel(capacity: usize) -> (PlayheadProducer, PlayheadConsumer) {
    let rb = HeapRb::<usize>::new(capacity);
    rb.split()
}

/// Wrap a playhead producer as a step observer
///
/// A full buffer drops the position rather than blocking the tick thread;
/// the UI catches up on the next publication.
pub fn playhead_feed(producer: PlayheadProducer) -> StepObserver {
    let producer = Mutex::new(producer);
    Box::new(move |step| {
        if let Ok(mut producer) = producer.lock() {
            let _ = producer.try_push(step);
        }
    })
}
