//! Sink implementations: stdout, in-memory capture, and channel streaming.

use std::io::{self, Result as IoResult, Stdout, Write};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::event::Event;
use crate::telemetry::{PlainFormatter, TelemetryFormatter};

/// A destination for pipeline events. Implementations decide the format and
/// the medium; the bus calls them in registration order.
pub trait EventSink: Send + Sync {
    fn handle(&mut self, event: &Event) -> IoResult<()>;
}

/// Writes each event to stdout through a [`TelemetryFormatter`].
pub struct StdOutSink<F: TelemetryFormatter = PlainFormatter> {
    out: Stdout,
    formatter: F,
}

impl Default for StdOutSink {
    fn default() -> Self {
        Self::with_formatter(PlainFormatter::new())
    }
}

impl<F: TelemetryFormatter> StdOutSink<F> {
    pub fn with_formatter(formatter: F) -> Self {
        Self {
            out: io::stdout(),
            formatter,
        }
    }
}

impl<F: TelemetryFormatter> EventSink for StdOutSink<F> {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        let rendered = self.formatter.render_event(event);
        let mut out = self.out.lock();
        out.write_all(rendered.join_lines().as_bytes())?;
        out.flush()
    }
}

/// Captures events in memory. Clones share one buffer, so a test can keep a
/// handle and give its twin to the bus.
#[derive(Clone, Default)]
pub struct MemorySink {
    captured: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything captured so far.
    pub fn snapshot(&self) -> Vec<Event> {
        self.captured.lock().expect("event capture poisoned").clone()
    }

    pub fn clear(&self) {
        self.captured.lock().expect("event capture poisoned").clear();
    }
}

impl EventSink for MemorySink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        self.captured
            .lock()
            .expect("event capture poisoned")
            .push(event.clone());
        Ok(())
    }
}

/// Forwards events into a tokio channel for async consumers, typically a
/// task streaming turn progress (routing, tool calls, fallback) to a UI.
///
/// # Examples
/// ```no_run
/// use tokio::sync::mpsc;
/// use switchboard::event_bus::{ChannelSink, EventBus};
///
/// let (tx, mut rx) = mpsc::unbounded_channel();
/// let bus = EventBus::default();
/// bus.add_sink(ChannelSink::new(tx));
///
/// tokio::spawn(async move {
///     while let Some(event) = rx.recv().await {
///         println!("{event}");
///     }
/// });
/// ```
pub struct ChannelSink {
    forward: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    pub fn new(forward: mpsc::UnboundedSender<Event>) -> Self {
        Self { forward }
    }
}

impl EventSink for ChannelSink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        self.forward
            .send(event.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "event receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_clones_share_the_buffer() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer
            .handle(&Event::diagnostic("router", "scored 4 experts"))
            .unwrap();
        assert_eq!(sink.snapshot().len(), 1);
        sink.clear();
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn test_channel_sink_reports_a_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        let err = sink
            .handle(&Event::diagnostic("router", "scored 4 experts"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
