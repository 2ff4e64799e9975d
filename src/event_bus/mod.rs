//! Event bus utilities providing fan-out and pluggable sinks.
//!
//! Pipeline stages (router, experts, tools) push [`Event`]s through a flume
//! channel; a background listener broadcasts each event to every configured
//! [`EventSink`]. Sinks cover stdout logging, in-memory capture for tests,
//! and per-query streaming over a tokio channel.

pub mod bus;
pub mod config;
pub mod event;
pub mod sink;

pub use bus::EventBus;
pub use config::{EventBusConfig, SinkConfig};
pub use event::{Event, ModelEvent, ModelEventScope, StageEvent, TURN_END_SCOPE};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
