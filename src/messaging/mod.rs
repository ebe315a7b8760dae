// Messaging - lock-free channels between the engine and its collaborators

pub mod channels;
pub mod command;

pub use channels::{
    PlayheadConsumer, PlayheadProducer, TriggerConsumer, TriggerProducer, create_playhead_channel,
    create_trigger_channel, playhead_feed,
};
pub use command::TriggerCommand;
