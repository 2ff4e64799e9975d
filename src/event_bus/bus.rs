use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio::task;
use tracing::warn;

use super::event::Event;
use super::sink::{EventSink, StdOutSink};

/// Fan-out point for pipeline events.
///
/// Producers hold a cheap sender obtained from [`EventBus::get_sender`]; one
/// background listener forwards every event to all registered sinks in
/// order.
///
/// # Examples
/// ```no_run
/// use switchboard::event_bus::{EventBus, MemorySink};
///
/// let captured = MemorySink::new();
/// let bus = EventBus::with_sink(captured.clone());
/// bus.listen_for_events();
/// // Hand bus.get_sender() to the orchestrator; read captured.snapshot()
/// // after the turn.
/// ```
pub struct EventBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    channel: (flume::Sender<Event>, flume::Receiver<Event>),
    listener: Mutex<Option<Listener>>,
}

struct Listener {
    shutdown: oneshot::Sender<()>,
    task: task::JoinHandle<()>,
}

impl Default for EventBus {
    /// A bus that prints every event to stdout.
    fn default() -> Self {
        Self::with_sink(StdOutSink::default())
    }
}

impl EventBus {
    pub fn with_sink<S: EventSink + 'static>(sink: S) -> Self {
        Self::with_sinks(vec![Box::new(sink)])
    }

    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            channel: flume::unbounded(),
            listener: Mutex::new(None),
        }
    }

    /// Register another sink at runtime. Events emitted afterwards reach it;
    /// earlier ones are not replayed.
    pub fn add_sink<S: EventSink + 'static>(&self, sink: S) {
        self.sinks
            .lock()
            .expect("sink registry poisoned")
            .push(Box::new(sink));
    }

    /// The sender half handed to producers (the orchestrator and, through
    /// it, every expert).
    pub fn get_sender(&self) -> flume::Sender<Event> {
        self.channel.0.clone()
    }

    /// Start the background fan-out task. Idempotent: extra calls while a
    /// listener is running do nothing.
    pub fn listen_for_events(&self) {
        let mut guard = self.listener.lock().expect("listener poisoned");
        if guard.is_some() {
            return;
        }

        let receiver = self.channel.1.clone();
        let sinks = Arc::clone(&self.sinks);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        // Flush what is already queued so a clean shutdown
                        // never swallows the tail of a turn.
                        while let Ok(event) = receiver.try_recv() {
                            broadcast(&sinks, &event);
                        }
                        break;
                    }
                    received = receiver.recv_async() => match received {
                        Ok(event) => broadcast(&sinks, &event),
                        // Every sender, the bus included, is gone.
                        Err(_) => break,
                    },
                }
            }
        });

        *guard = Some(Listener {
            shutdown: shutdown_tx,
            task,
        });
    }

    /// Stop the listener after flushing queued events. Safe to call when no
    /// listener is running.
    pub async fn stop_listener(&self) {
        let listener = self.listener.lock().expect("listener poisoned").take();
        if let Some(listener) = listener {
            let _ = listener.shutdown.send(());
            let _ = listener.task.await;
        }
    }
}

fn broadcast(sinks: &Mutex<Vec<Box<dyn EventSink>>>, event: &Event) {
    let mut sinks = sinks.lock().expect("sink registry poisoned");
    for sink in sinks.iter_mut() {
        if let Err(err) = sink.handle(event) {
            warn!("event sink failed: {err}");
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.listener.lock() {
            if let Some(listener) = guard.take() {
                let _ = listener.shutdown.send(());
                listener.task.abort();
            }
        }
    }
}
