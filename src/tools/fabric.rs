//! Network fabric controller client: sites, fabrics, devices, telemetry,
//! alarms, and workflows.
//!
//! Unlike the inventory service, the controller uses session tokens. The
//! client logs in lazily, refreshes the token shortly before it expires, and
//! on a 401 re-authenticates exactly once before giving up.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::{ToolError, render_table};

/// Sessions last this long on the controller side.
pub const TOKEN_TTL: Duration = Duration::from_secs(1800);
/// Refresh this far before expiry so in-flight requests never race the TTL.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Telemetry is always reported over the trailing hour.
pub const TELEMETRY_WINDOW: &str = "1h";
/// Alarm queries look back this many hours.
pub const ALARM_WINDOW_HOURS: u64 = 24;

/// Which metric a telemetry query asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TelemetryKind {
    Cpu,
    Memory,
    Interface,
    Utilization,
}

impl TelemetryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Interface => "interface",
            Self::Utilization => "utilization",
        }
    }
}

impl std::fmt::Display for TelemetryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlarmSeverity {
    Critical,
    Major,
    Minor,
}

impl AlarmSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }
}

impl std::fmt::Display for AlarmSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fabric questions the controller can answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FabricQuery {
    Sites,
    Fabrics,
    Devices,
    Telemetry(TelemetryKind),
    Alarms(AlarmSeverity),
    Workflows,
    /// Sites, devices, and critical alarms in one answer. Also the fallback
    /// when no keyword matches.
    Overview,
}

impl FabricQuery {
    /// Map a free-text question onto a fabric query. Total: anything that
    /// matches nothing becomes [`FabricQuery::Overview`].
    pub fn classify(text: &str) -> Self {
        let text = text.to_lowercase();

        if text.contains("telemetry")
            || text.contains("cpu")
            || text.contains("memory")
            || text.contains("utilization")
            || text.contains("usage")
            || text.contains("interface")
        {
            let kind = if text.contains("cpu") {
                TelemetryKind::Cpu
            } else if text.contains("memory") {
                TelemetryKind::Memory
            } else if text.contains("interface") {
                TelemetryKind::Interface
            } else {
                TelemetryKind::Utilization
            };
            return Self::Telemetry(kind);
        }
        if text.contains("alarm") || text.contains("alert") || text.contains("fault") {
            let severity = if text.contains("major") {
                AlarmSeverity::Major
            } else if text.contains("minor") {
                AlarmSeverity::Minor
            } else {
                AlarmSeverity::Critical
            };
            return Self::Alarms(severity);
        }
        if text.contains("workflow") || text.contains("job") {
            return Self::Workflows;
        }
        if text.contains("site") {
            return Self::Sites;
        }
        if text.contains("fabric") || text.contains("vxlan") {
            return Self::Fabrics;
        }
        if text.contains("device")
            || text.contains("switch")
            || text.contains("spine")
            || text.contains("leaf")
            || text.contains("router")
        {
            return Self::Devices;
        }
        Self::Overview
    }
}

// ===== Record types =====

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteSummary {
    pub name: String,
    pub location: String,
    pub health: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FabricSummary {
    pub name: String,
    pub fabric_type: String,
    pub site: String,
    pub health: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceSummary {
    pub name: String,
    pub role: String,
    pub model: String,
    pub serial: String,
    pub health: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetrySample {
    pub device: String,
    pub metric: String,
    pub average: f64,
    pub peak: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FabricAlarm {
    pub severity: String,
    pub message: String,
    pub source: String,
    pub raised_at: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowSummary {
    pub name: String,
    pub status: String,
    pub started_at: String,
}

/// Read access to the fabric controller. Implemented by [`FabricClient`]
/// over HTTP and by canned fixtures in tests.
#[async_trait]
pub trait FabricApi: Send + Sync {
    async fn sites(&self) -> Result<Vec<SiteSummary>, ToolError>;
    async fn fabrics(&self) -> Result<Vec<FabricSummary>, ToolError>;
    async fn devices(&self) -> Result<Vec<DeviceSummary>, ToolError>;
    async fn telemetry(&self, kind: TelemetryKind) -> Result<Vec<TelemetrySample>, ToolError>;
    async fn alarms(&self, severity: AlarmSeverity) -> Result<Vec<FabricAlarm>, ToolError>;
    async fn workflows(&self) -> Result<Vec<WorkflowSummary>, ToolError>;
}

/// Fetch and render the answer for one fabric query as markdown.
pub async fn answer_fabric_query(
    api: &dyn FabricApi,
    query: FabricQuery,
) -> Result<String, ToolError> {
    match query {
        FabricQuery::Sites => Ok(render_sites(&api.sites().await?)),
        FabricQuery::Fabrics => Ok(render_fabrics(&api.fabrics().await?)),
        FabricQuery::Devices => Ok(render_devices(&api.devices().await?)),
        FabricQuery::Telemetry(kind) => Ok(render_telemetry(kind, &api.telemetry(kind).await?)),
        FabricQuery::Alarms(severity) => Ok(render_alarms(severity, &api.alarms(severity).await?)),
        FabricQuery::Workflows => Ok(render_workflows(&api.workflows().await?)),
        FabricQuery::Overview => {
            let sites = api.sites().await?;
            let devices = api.devices().await?;
            let alarms = api.alarms(AlarmSeverity::Critical).await?;
            Ok(format!(
                "**Fabric overview**\n\n{}\n\n{}\n\n{}",
                render_sites(&sites),
                render_devices(&devices),
                render_alarms(AlarmSeverity::Critical, &alarms)
            ))
        }
    }
}

// ===== Rendering =====

fn render_sites(sites: &[SiteSummary]) -> String {
    if sites.is_empty() {
        return "No sites are onboarded.".to_string();
    }
    let rows: Vec<Vec<String>> = sites
        .iter()
        .map(|s| vec![s.name.clone(), s.location.clone(), s.health.clone()])
        .collect();
    format!(
        "**Sites**\n\n{}",
        render_table(&["Name", "Location", "Health"], &rows)
    )
}

fn render_fabrics(fabrics: &[FabricSummary]) -> String {
    if fabrics.is_empty() {
        return "No fabrics are configured.".to_string();
    }
    let rows: Vec<Vec<String>> = fabrics
        .iter()
        .map(|f| {
            vec![
                f.name.clone(),
                f.fabric_type.clone(),
                f.site.clone(),
                f.health.clone(),
            ]
        })
        .collect();
    format!(
        "**Fabrics**\n\n{}",
        render_table(&["Name", "Type", "Site", "Health"], &rows)
    )
}

fn render_devices(devices: &[DeviceSummary]) -> String {
    if devices.is_empty() {
        return "No devices are managed by the controller.".to_string();
    }
    let rows: Vec<Vec<String>> = devices
        .iter()
        .map(|d| {
            vec![
                d.name.clone(),
                d.role.clone(),
                d.model.clone(),
                d.serial.clone(),
                d.health.clone(),
            ]
        })
        .collect();
    format!(
        "**Devices**\n\n{}",
        render_table(&["Name", "Role", "Model", "Serial", "Health"], &rows)
    )
}

fn render_telemetry(kind: TelemetryKind, samples: &[TelemetrySample]) -> String {
    if samples.is_empty() {
        return format!("No {kind} telemetry reported in the last {TELEMETRY_WINDOW}.");
    }
    let rows: Vec<Vec<String>> = samples
        .iter()
        .map(|s| {
            vec![
                s.device.clone(),
                s.metric.clone(),
                format!("{:.1}", s.average),
                format!("{:.1}", s.peak),
            ]
        })
        .collect();
    format!(
        "**{} telemetry (last {TELEMETRY_WINDOW})**\n\n{}",
        capitalize(kind.as_str()),
        render_table(&["Device", "Metric", "Average", "Peak"], &rows)
    )
}

fn render_alarms(severity: AlarmSeverity, alarms: &[FabricAlarm]) -> String {
    if alarms.is_empty() {
        return format!("No {severity} alarms in the last {ALARM_WINDOW_HOURS} hours.");
    }
    let rows: Vec<Vec<String>> = alarms
        .iter()
        .map(|a| {
            vec![
                a.severity.clone(),
                a.message.clone(),
                a.source.clone(),
                a.raised_at.clone(),
            ]
        })
        .collect();
    format!(
        "**{} alarms (last {ALARM_WINDOW_HOURS} hours)**\n\n{}",
        capitalize(severity.as_str()),
        render_table(&["Severity", "Message", "Source", "Raised"], &rows)
    )
}

fn render_workflows(workflows: &[WorkflowSummary]) -> String {
    if workflows.is_empty() {
        return "No workflows have run recently.".to_string();
    }
    let rows: Vec<Vec<String>> = workflows
        .iter()
        .map(|w| vec![w.name.clone(), w.status.clone(), w.started_at.clone()])
        .collect();
    format!(
        "**Workflows**\n\n{}",
        render_table(&["Workflow", "Status", "Started"], &rows)
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// ===== HTTP client =====

struct TokenState {
    token: String,
    acquired_at: Instant,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: String,
}

#[derive(Deserialize)]
struct ResultsEnvelope<T> {
    #[serde(default)]
    results: Vec<T>,
}

/// HTTP client for the fabric controller with session-token auth.
pub struct FabricClient {
    base_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
    token: Mutex<Option<TokenState>>,
    token_ttl: Duration,
}

impl FabricClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            username: username.into(),
            password: password.into(),
            client: reqwest::Client::new(),
            token: Mutex::new(None),
            token_ttl: TOKEN_TTL,
        }
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Override the session TTL (tests shorten it to force refreshes).
    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    async fn login(&self) -> Result<String, ToolError> {
        let response = self
            .client
            .post(format!("{}/api/v1/auth/login", self.base_url))
            .json(&serde_json::json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Auth(format!(
                "controller login failed with status {}",
                status.as_u16()
            )));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|err| ToolError::MalformedResponse(err.to_string()))?;
        if body.token.is_empty() {
            return Err(ToolError::MalformedResponse(
                "login response carried no token".to_string(),
            ));
        }
        debug!("fabric controller session established");
        Ok(body.token)
    }

    /// Return a token valid for at least the refresh margin, logging in if
    /// needed. `force` discards the cached token first (401 recovery).
    async fn session_token(&self, force: bool) -> Result<String, ToolError> {
        let mut guard = self.token.lock().await;
        if !force {
            if let Some(state) = guard.as_ref() {
                let fresh_for = self.token_ttl.saturating_sub(TOKEN_REFRESH_MARGIN);
                if state.acquired_at.elapsed() < fresh_for {
                    return Ok(state.token.clone());
                }
            }
        }

        let token = self.login().await?;
        *guard = Some(TokenState {
            token: token.clone(),
            acquired_at: Instant::now(),
        });
        Ok(token)
    }

    async fn fetch<T: serde::de::DeserializeOwned + Default>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ToolError> {
        let token = self.session_token(false).await?;
        let response = self.authed_get(path, query, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            // Session expired server-side: re-authenticate once, retry once.
            let token = self.session_token(true).await?;
            let response = self.authed_get(path, query, &token).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(ToolError::Auth(
                    "controller rejected a freshly issued session token".to_string(),
                ));
            }
            return Self::decode(response).await;
        }

        Self::decode(response).await
    }

    async fn authed_get(
        &self,
        path: &str,
        query: &[(&str, String)],
        token: &str,
    ) -> Result<reqwest::Response, ToolError> {
        Ok(self
            .client
            .get(format!("{}{path}", self.base_url))
            .header("X-Auth-Token", token)
            .query(query)
            .send()
            .await?)
    }

    async fn decode<T: serde::de::DeserializeOwned + Default>(
        response: reqwest::Response,
    ) -> Result<Vec<T>, ToolError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ToolError::Http {
                status: status.as_u16(),
                message,
            });
        }
        let envelope: ResultsEnvelope<T> = response
            .json()
            .await
            .map_err(|err| ToolError::MalformedResponse(err.to_string()))?;
        Ok(envelope.results)
    }
}

#[async_trait]
impl FabricApi for FabricClient {
    async fn sites(&self) -> Result<Vec<SiteSummary>, ToolError> {
        self.fetch("/api/v1/fabric/sites", &[]).await
    }

    async fn fabrics(&self) -> Result<Vec<FabricSummary>, ToolError> {
        self.fetch("/api/v1/fabric/fabrics", &[]).await
    }

    async fn devices(&self) -> Result<Vec<DeviceSummary>, ToolError> {
        self.fetch("/api/v1/fabric/devices", &[]).await
    }

    async fn telemetry(&self, kind: TelemetryKind) -> Result<Vec<TelemetrySample>, ToolError> {
        self.fetch(
            "/api/v1/fabric/telemetry",
            &[
                ("metric", kind.as_str().to_string()),
                ("window", TELEMETRY_WINDOW.to_string()),
            ],
        )
        .await
    }

    async fn alarms(&self, severity: AlarmSeverity) -> Result<Vec<FabricAlarm>, ToolError> {
        self.fetch(
            "/api/v1/fabric/alarms",
            &[
                ("severity", severity.as_str().to_string()),
                ("hours", ALARM_WINDOW_HOURS.to_string()),
            ],
        )
        .await
    }

    async fn workflows(&self) -> Result<Vec<WorkflowSummary>, ToolError> {
        self.fetch("/api/v1/fabric/workflows", &[]).await
    }
}
