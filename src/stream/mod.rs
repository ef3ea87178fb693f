//! Run event streaming: frame types and the streaming client.

pub mod client;
pub mod events;

pub use client::{open_event_stream, RunEventStream};
pub use events::*;
