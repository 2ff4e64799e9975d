//! Live infrastructure API clients.
//!
//! Two backends answer structured queries about the estate: the inventory
//! service (servers, VMs, alarms, firmware) and the network fabric controller
//! (sites, devices, telemetry, workflows). Each is exposed behind a trait so
//! callers can swap in canned data, plus an HTTP client implementing it.
//!
//! Responses are rendered as markdown tables; rendering is pure and separate
//! from fetching.

pub mod fabric;
pub mod inventory;

use miette::Diagnostic;
use thiserror::Error;

pub use fabric::{
    AlarmSeverity, FabricApi, FabricClient, FabricQuery, TelemetryKind, answer_fabric_query,
};
pub use inventory::{
    InventoryApi, InventoryClient, InventoryQuery, answer_inventory_query,
};

/// Errors from the live API clients.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    /// The service answered with a non-success status.
    #[error("api request failed with status {status}: {message}")]
    #[diagnostic(code(switchboard::tools::http))]
    Http { status: u16, message: String },

    /// The request never completed (connect, DNS, body read).
    #[error("api transport error: {0}")]
    #[diagnostic(code(switchboard::tools::transport))]
    Transport(#[from] reqwest::Error),

    /// Login failed, or a refreshed session was still rejected.
    #[error("authentication failed: {0}")]
    #[diagnostic(
        code(switchboard::tools::auth),
        help("Check the configured credentials for the backend service.")
    )]
    Auth(String),

    /// The service answered 2xx but the body was not the expected shape.
    #[error("malformed api response: {0}")]
    #[diagnostic(code(switchboard::tools::malformed_response))]
    MalformedResponse(String),
}

/// Render a markdown table. Cells containing `|` are escaped so a hostile
/// device name cannot break the row structure.
pub(crate) fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push('|');
    for header in headers {
        out.push(' ');
        out.push_str(header);
        out.push_str(" |");
    }
    out.push('\n');
    out.push('|');
    for _ in headers {
        out.push_str(" --- |");
    }
    out.push('\n');
    for row in rows {
        out.push('|');
        for cell in row {
            out.push(' ');
            out.push_str(&cell.replace('|', "\\|"));
            out.push_str(" |");
        }
        out.push('\n');
    }
    out
}
