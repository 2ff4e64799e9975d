//! Terminal rendering for pipeline events and fault reports.
//!
//! Sinks that write to a terminal delegate formatting here so color handling
//! lives in one place. Output is plain text; ANSI color is layered on only
//! when the mode allows it, so redirected logs stay clean.

use std::io::IsTerminal;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::event_bus::Event;
use crate::faults::{ErrorLadder, FaultEvent};

const SCOPE_COLOR: &str = "\x1b[32m"; // green
const DETAIL_COLOR: &str = "\x1b[36m"; // cyan
const RESET_COLOR: &str = "\x1b[0m";

/// Installs the global tracing subscriber for binaries and tests.
///
/// Honors `RUST_LOG` when set and otherwise logs this crate at info. Safe to
/// call more than once; later calls leave the installed subscriber in place.
pub fn init_tracing() {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn,switchboard=info"))
        .unwrap_or_default();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Whether rendered output carries ANSI color codes.
///
/// # Examples
/// ```
/// use switchboard::telemetry::FormatterMode;
///
/// // Resolve Auto once, up front.
/// let mode = FormatterMode::auto_detect();
///
/// // Or force plain output for a log file.
/// let mode = FormatterMode::Plain;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatterMode {
    /// Color when stderr is a terminal, plain otherwise.
    #[default]
    Auto,
    /// Always emit ANSI color codes.
    Colored,
    /// Never emit ANSI color codes.
    Plain,
}

impl FormatterMode {
    /// Resolve `Auto` against the current stderr, once.
    pub fn auto_detect() -> Self {
        if std::io::stderr().is_terminal() {
            Self::Colored
        } else {
            Self::Plain
        }
    }

    /// `Auto` re-checks the terminal on every call, so a redirect set up
    /// after startup is picked up.
    pub fn is_colored(self) -> bool {
        match self {
            Self::Auto => std::io::stderr().is_terminal(),
            Self::Colored => true,
            Self::Plain => false,
        }
    }
}

/// One rendered telemetry item: an optional scope header plus ready-to-write
/// lines, each newline-terminated.
#[derive(Clone, Debug, Default)]
pub struct EventRender {
    pub context: Option<String>,
    pub lines: Vec<String>,
}

impl EventRender {
    pub fn join_lines(&self) -> String {
        self.lines.concat()
    }
}

/// Renders events and fault lists for a sink to write out.
pub trait TelemetryFormatter: Send + Sync {
    fn render_event(&self, event: &Event) -> EventRender;
    fn render_faults(&self, faults: &[FaultEvent]) -> Vec<EventRender>;
}

/// The formatter behind the stdout sink: single-line events, multi-line
/// fault blocks with an indented cause chain.
pub struct PlainFormatter {
    mode: FormatterMode,
}

impl PlainFormatter {
    pub fn new() -> Self {
        Self {
            mode: FormatterMode::Auto,
        }
    }

    pub fn with_mode(mode: FormatterMode) -> Self {
        Self { mode }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.mode.is_colored() {
            format!("{code}{text}{RESET_COLOR}")
        } else {
            text.to_string()
        }
    }

    fn detail_line(&self, text: &str) -> String {
        format!("{}\n", self.paint(DETAIL_COLOR, text))
    }

    fn render_fault(&self, index: usize, fault: &FaultEvent) -> EventRender {
        let scope = format!("{:?}", fault.scope);
        let mut lines = vec![format!(
            "[{index}] {} | {}\n",
            fault.when,
            self.paint(SCOPE_COLOR, &scope)
        )];
        lines.push(self.detail_line(&format!("  error: {}", fault.error.message)));
        self.push_causes(&fault.error, 1, &mut lines);
        if !fault.tags.is_empty() {
            lines.push(self.detail_line(&format!("  tags: {:?}", fault.tags)));
        }
        if !fault.context.is_null() {
            lines.push(self.detail_line(&format!("  context: {}", fault.context)));
        }
        EventRender {
            context: Some(scope),
            lines,
        }
    }

    // Each nesting level indents two more spaces.
    fn push_causes(&self, error: &ErrorLadder, depth: usize, lines: &mut Vec<String>) {
        if let Some(cause) = &error.cause {
            lines.push(self.detail_line(&format!("{}cause: {}", "  ".repeat(depth), cause.message)));
            self.push_causes(cause, depth + 1, lines);
        }
    }
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryFormatter for PlainFormatter {
    fn render_event(&self, event: &Event) -> EventRender {
        EventRender {
            context: event.scope_label().map(str::to_string),
            lines: vec![self.detail_line(&event.to_string())],
        }
    }

    fn render_faults(&self, faults: &[FaultEvent]) -> Vec<EventRender> {
        faults
            .iter()
            .enumerate()
            .map(|(index, fault)| self.render_fault(index, fault))
            .collect()
    }
}
