//! Declarative sink selection for assembling an [`EventBus`].

use super::bus::EventBus;
use super::sink::{EventSink, MemorySink, StdOutSink};

/// A sink the bus can construct on its own.
///
/// Sinks that need a live handle, like
/// [`ChannelSink`](super::ChannelSink), are registered directly through
/// [`EventBus::with_sinks`] instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkConfig {
    /// Print each event to stdout through the plain formatter.
    Stdout,
    /// Capture events in memory for later inspection.
    Memory,
}

/// Which sinks a freshly built [`EventBus`] starts with.
///
/// # Examples
///
/// ```
/// use switchboard::event_bus::{EventBusConfig, SinkConfig};
///
/// let config = EventBusConfig::stdout_only().add_sink(SinkConfig::Memory);
/// let (bus, capture) = config.build();
/// assert!(capture.is_some());
/// # drop(bus);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventBusConfig {
    sinks: Vec<SinkConfig>,
}

impl EventBusConfig {
    pub fn new(sinks: Vec<SinkConfig>) -> Self {
        Self { sinks }
    }

    /// Stdout only, matching [`EventBus::default`].
    pub fn stdout_only() -> Self {
        Self::new(vec![SinkConfig::Stdout])
    }

    /// Append a sink, ignoring duplicates.
    #[must_use]
    pub fn add_sink(mut self, sink: SinkConfig) -> Self {
        if !self.sinks.contains(&sink) {
            self.sinks.push(sink);
        }
        self
    }

    pub fn sinks(&self) -> &[SinkConfig] {
        &self.sinks
    }

    /// Build the bus. When a memory sink was requested the returned handle
    /// shares its buffer, so captured events stay reachable after the bus
    /// takes ownership of the sink.
    pub fn build(&self) -> (EventBus, Option<MemorySink>) {
        let mut sinks: Vec<Box<dyn EventSink>> = Vec::new();
        let mut capture = None;
        for sink in &self.sinks {
            match sink {
                SinkConfig::Stdout => sinks.push(Box::new(StdOutSink::default())),
                SinkConfig::Memory => {
                    let memory = MemorySink::new();
                    sinks.push(Box::new(memory.clone()));
                    capture = Some(memory);
                }
            }
        }
        (EventBus::with_sinks(sinks), capture)
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::stdout_only()
    }
}
