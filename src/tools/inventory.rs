//! Datacenter inventory service client: servers, VMs, device connectors,
//! alarms, firmware, and server profiles.

use async_trait::async_trait;
use reqwest::StatusCode;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::{ToolError, render_table};

/// The inventory questions the service can answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InventoryQuery {
    Servers,
    VirtualMachines,
    DeviceConnectors,
    NetworkElements,
    HealthAlerts,
    FirmwareVersions,
    FirmwareUpgrades,
    ServerProfiles,
}

impl InventoryQuery {
    /// Map a free-text question onto a query kind.
    ///
    /// Matching is keyword based and ordered so the more specific ask wins:
    /// "server profile" is profiles, not servers; "firmware upgrade" is an
    /// upgrade recommendation, not a version listing. Returns `None` when
    /// nothing matches.
    pub fn classify(text: &str) -> Option<Self> {
        let text = text.to_lowercase();

        if text.contains("profile") {
            return Some(Self::ServerProfiles);
        }
        if text.contains("upgrade") || text.contains("recommend") {
            return Some(Self::FirmwareUpgrades);
        }
        if text.contains("firmware") {
            return Some(Self::FirmwareVersions);
        }
        if text.contains("alert")
            || text.contains("alarm")
            || text.contains("health")
            || text.contains("fault")
        {
            return Some(Self::HealthAlerts);
        }
        if text.contains("connector") || text.contains("registration") {
            return Some(Self::DeviceConnectors);
        }
        if text.contains("interconnect") || text.contains("network element") {
            return Some(Self::NetworkElements);
        }
        if has_token(&text, "vm")
            || has_token(&text, "vms")
            || text.contains("virtual machine")
            || text.contains("hypervisor")
        {
            return Some(Self::VirtualMachines);
        }
        if text.contains("server")
            || text.contains("compute")
            || text.contains("blade")
            || text.contains("inventory")
            || text.contains("serial")
            || text.contains("power")
        {
            return Some(Self::Servers);
        }
        None
    }
}

impl std::fmt::Display for InventoryQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Servers => "servers",
            Self::VirtualMachines => "virtual machines",
            Self::DeviceConnectors => "device connectors",
            Self::NetworkElements => "network elements",
            Self::HealthAlerts => "health alerts",
            Self::FirmwareVersions => "firmware versions",
            Self::FirmwareUpgrades => "firmware upgrades",
            Self::ServerProfiles => "server profiles",
        };
        write!(f, "{label}")
    }
}

fn has_token(text: &str, token: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|word| word == token)
}

// ===== Record types =====

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSummary {
    pub name: String,
    pub model: String,
    pub serial: String,
    pub power_state: String,
    pub firmware: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VmSummary {
    pub name: String,
    pub power_state: String,
    pub cpu_count: u32,
    pub memory_mib: u64,
    pub host: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorSummary {
    pub device_id: String,
    pub platform: String,
    pub connection_status: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkElementSummary {
    pub name: String,
    pub model: String,
    pub serial: String,
    pub management_ip: String,
    pub version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlarmSummary {
    pub severity: String,
    pub description: String,
    pub affected_object: String,
    pub created_at: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileSummary {
    pub name: String,
    pub state: String,
    pub assigned_server: String,
}

/// Read access to the inventory backend. Implemented by [`InventoryClient`]
/// over HTTP and by canned fixtures in tests.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    async fn servers(&self) -> Result<Vec<ServerSummary>, ToolError>;
    async fn virtual_machines(&self) -> Result<Vec<VmSummary>, ToolError>;
    async fn device_connectors(&self) -> Result<Vec<ConnectorSummary>, ToolError>;
    async fn network_elements(&self) -> Result<Vec<NetworkElementSummary>, ToolError>;
    async fn health_alerts(&self) -> Result<Vec<AlarmSummary>, ToolError>;
    async fn server_profiles(&self) -> Result<Vec<ProfileSummary>, ToolError>;
    /// Latest catalog firmware for a server model, if the catalog knows it.
    async fn latest_firmware(&self, model: &str) -> Result<Option<String>, ToolError>;
}

/// Fetch and render the answer for one inventory query as markdown.
pub async fn answer_inventory_query(
    api: &dyn InventoryApi,
    query: InventoryQuery,
) -> Result<String, ToolError> {
    match query {
        InventoryQuery::Servers => Ok(render_servers(&api.servers().await?)),
        InventoryQuery::VirtualMachines => Ok(render_vms(&api.virtual_machines().await?)),
        InventoryQuery::DeviceConnectors => {
            Ok(render_connectors(&api.device_connectors().await?))
        }
        InventoryQuery::NetworkElements => {
            Ok(render_network_elements(&api.network_elements().await?))
        }
        InventoryQuery::HealthAlerts => Ok(render_alarms(&api.health_alerts().await?)),
        InventoryQuery::FirmwareVersions => {
            Ok(render_firmware_versions(&api.servers().await?))
        }
        InventoryQuery::FirmwareUpgrades => firmware_upgrade_report(api).await,
        InventoryQuery::ServerProfiles => Ok(render_profiles(&api.server_profiles().await?)),
    }
}

// ===== Rendering =====

const NO_SERVERS: &str = "No servers found in inventory.";

fn render_servers(servers: &[ServerSummary]) -> String {
    if servers.is_empty() {
        return NO_SERVERS.to_string();
    }
    let rows: Vec<Vec<String>> = servers
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                s.model.clone(),
                s.serial.clone(),
                s.power_state.clone(),
                s.firmware.clone(),
            ]
        })
        .collect();
    format!(
        "**Physical servers**\n\n{}",
        render_table(&["Name", "Model", "Serial", "Power State", "Firmware"], &rows)
    )
}

fn render_vms(vms: &[VmSummary]) -> String {
    if vms.is_empty() {
        return "No virtual machines found in inventory.".to_string();
    }
    let rows: Vec<Vec<String>> = vms
        .iter()
        .map(|vm| {
            vec![
                vm.name.clone(),
                vm.power_state.clone(),
                vm.cpu_count.to_string(),
                vm.memory_mib.to_string(),
                vm.host.clone(),
            ]
        })
        .collect();
    format!(
        "**Virtual machines**\n\n{}",
        render_table(
            &["Name", "Power State", "vCPUs", "Memory (MiB)", "Host"],
            &rows
        )
    )
}

fn render_connectors(connectors: &[ConnectorSummary]) -> String {
    if connectors.is_empty() {
        return "No device connectors are registered.".to_string();
    }
    let rows: Vec<Vec<String>> = connectors
        .iter()
        .map(|c| {
            vec![
                c.device_id.clone(),
                c.platform.clone(),
                c.connection_status.clone(),
            ]
        })
        .collect();
    format!(
        "**Device connectors**\n\n{}",
        render_table(&["Device ID", "Platform", "Connection Status"], &rows)
    )
}

fn render_network_elements(elements: &[NetworkElementSummary]) -> String {
    if elements.is_empty() {
        return "No network elements found in inventory.".to_string();
    }
    let rows: Vec<Vec<String>> = elements
        .iter()
        .map(|e| {
            vec![
                e.name.clone(),
                e.model.clone(),
                e.serial.clone(),
                e.management_ip.clone(),
                e.version.clone(),
            ]
        })
        .collect();
    format!(
        "**Network elements**\n\n{}",
        render_table(&["Name", "Model", "Serial", "Management IP", "Version"], &rows)
    )
}

fn render_alarms(alarms: &[AlarmSummary]) -> String {
    if alarms.is_empty() {
        return "No active health alerts.".to_string();
    }
    let rows: Vec<Vec<String>> = alarms
        .iter()
        .map(|a| {
            vec![
                a.severity.clone(),
                a.description.clone(),
                a.affected_object.clone(),
                a.created_at.clone(),
            ]
        })
        .collect();
    format!(
        "**Active health alerts**\n\n{}",
        render_table(&["Severity", "Description", "Affected Object", "Created"], &rows)
    )
}

fn render_firmware_versions(servers: &[ServerSummary]) -> String {
    if servers.is_empty() {
        return NO_SERVERS.to_string();
    }
    let rows: Vec<Vec<String>> = servers
        .iter()
        .map(|s| vec![s.name.clone(), s.model.clone(), s.firmware.clone()])
        .collect();
    format!(
        "**Firmware versions**\n\n{}",
        render_table(&["Name", "Model", "Firmware"], &rows)
    )
}

fn render_profiles(profiles: &[ProfileSummary]) -> String {
    if profiles.is_empty() {
        return "No server profiles are configured.".to_string();
    }
    let rows: Vec<Vec<String>> = profiles
        .iter()
        .map(|p| vec![p.name.clone(), p.state.clone(), p.assigned_server.clone()])
        .collect();
    format!(
        "**Server profiles**\n\n{}",
        render_table(&["Name", "State", "Assigned Server"], &rows)
    )
}

/// Compare each server's firmware against the catalog and recommend strictly
/// newer versions. One catalog lookup per distinct model.
async fn firmware_upgrade_report(api: &dyn InventoryApi) -> Result<String, ToolError> {
    let servers = api.servers().await?;
    if servers.is_empty() {
        return Ok(NO_SERVERS.to_string());
    }

    let mut latest_by_model: FxHashMap<String, Option<String>> = FxHashMap::default();
    for server in &servers {
        if !latest_by_model.contains_key(&server.model) {
            let latest = api.latest_firmware(&server.model).await?;
            latest_by_model.insert(server.model.clone(), latest);
        }
    }

    let mut lines = Vec::new();
    for server in &servers {
        let Some(Some(latest)) = latest_by_model.get(&server.model) else {
            continue;
        };
        if firmware_is_newer(latest, &server.firmware) {
            lines.push(format!(
                "- {} (model {}): {} -> {}",
                server.name, server.model, server.firmware, latest
            ));
        }
    }

    if lines.is_empty() {
        Ok("All servers are running the latest known firmware.".to_string())
    } else {
        Ok(format!(
            "**Firmware upgrade recommendations**\n\n{}",
            lines.join("\n")
        ))
    }
}

/// `true` when `candidate` is strictly newer than `current`.
///
/// Versions are compared segment by segment with numeric runs compared as
/// numbers, so `4.10` sorts after `4.2` and `4.2(3a)` before `4.3(2b)`.
pub fn firmware_is_newer(candidate: &str, current: &str) -> bool {
    version_tokens(candidate) > version_tokens(current)
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum VersionToken {
    Number(u64),
    Word(String),
}

fn version_tokens(version: &str) -> Vec<VersionToken> {
    let mut tokens = Vec::new();
    let mut digits = String::new();
    let mut letters = String::new();

    let mut flush = |digits: &mut String, letters: &mut String, tokens: &mut Vec<VersionToken>| {
        if !digits.is_empty() {
            tokens.push(VersionToken::Number(
                digits.parse().unwrap_or(u64::MAX),
            ));
            digits.clear();
        }
        if !letters.is_empty() {
            tokens.push(VersionToken::Word(letters.to_lowercase()));
            letters.clear();
        }
    };

    for c in version.chars() {
        if c.is_ascii_digit() {
            if !letters.is_empty() {
                flush(&mut digits, &mut letters, &mut tokens);
            }
            digits.push(c);
        } else if c.is_alphabetic() {
            if !digits.is_empty() {
                flush(&mut digits, &mut letters, &mut tokens);
            }
            letters.push(c);
        } else {
            flush(&mut digits, &mut letters, &mut tokens);
        }
    }
    flush(&mut digits, &mut letters, &mut tokens);
    tokens
}

// ===== HTTP client =====

#[derive(Deserialize)]
struct ResultsEnvelope<T> {
    #[serde(default)]
    results: Vec<T>,
}

#[derive(Deserialize)]
struct LatestFirmware {
    #[serde(default)]
    version: String,
}

/// HTTP client for the inventory service, authenticated with a static API
/// key.
pub struct InventoryClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl InventoryClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn fetch<T: serde::de::DeserializeOwned + Default>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ToolError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ToolError::Auth(format!(
                "inventory service rejected the api key (status {})",
                status.as_u16()
            )));
        }
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
impl InventoryApi for InventoryClient {
    async fn servers(&self) -> Result<Vec<ServerSummary>, ToolError> {
        self.fetch("/api/v1/inventory/servers", &[]).await
    }

    async fn virtual_machines(&self) -> Result<Vec<VmSummary>, ToolError> {
        self.fetch("/api/v1/inventory/virtual-machines", &[]).await
    }

    async fn device_connectors(&self) -> Result<Vec<ConnectorSummary>, ToolError> {
        self.fetch("/api/v1/inventory/device-connectors", &[]).await
    }

    async fn network_elements(&self) -> Result<Vec<NetworkElementSummary>, ToolError> {
        self.fetch("/api/v1/inventory/network-elements", &[]).await
    }

    async fn health_alerts(&self) -> Result<Vec<AlarmSummary>, ToolError> {
        self.fetch("/api/v1/inventory/alarms", &[("state", "active")])
            .await
    }

    async fn server_profiles(&self) -> Result<Vec<ProfileSummary>, ToolError> {
        self.fetch("/api/v1/inventory/server-profiles", &[]).await
    }

    async fn latest_firmware(&self, model: &str) -> Result<Option<String>, ToolError> {
        let response = self
            .client
            .get(format!("{}/api/v1/inventory/firmware/latest", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("model", model)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ToolError::Auth(format!(
                "inventory service rejected the api key (status {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ToolError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body: LatestFirmware = response
            .json()
            .await
            .map_err(|err| ToolError::MalformedResponse(err.to_string()))?;
        Ok((!body.version.is_empty()).then_some(body.version))
    }
}
