//! Canned backend doubles for pipeline tests.
//!
//! Each double serves a small fixed estate, or serves HTTP 503 on every call
//! when built with `failing()` so tests can trip the fallback path.

use async_trait::async_trait;

use switchboard::tools::fabric::{
    DeviceSummary, FabricAlarm, FabricSummary, SiteSummary, TelemetrySample, WorkflowSummary,
};
use switchboard::tools::inventory::{
    AlarmSummary, ConnectorSummary, NetworkElementSummary, ProfileSummary, ServerSummary,
    VmSummary,
};
use switchboard::tools::{AlarmSeverity, FabricApi, InventoryApi, TelemetryKind, ToolError};

fn outage(service: &str) -> ToolError {
    ToolError::Http {
        status: 503,
        message: format!("{service} unavailable"),
    }
}

/// Inventory backend double with two servers and one VM.
pub struct CannedInventory {
    fail: bool,
}

impl CannedInventory {
    pub fn healthy() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }

    fn gate(&self) -> Result<(), ToolError> {
        if self.fail {
            return Err(outage("inventory service"));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryApi for CannedInventory {
    async fn servers(&self) -> Result<Vec<ServerSummary>, ToolError> {
        self.gate()?;
        Ok(vec![
            ServerSummary {
                name: "rack-01".into(),
                model: "UCS C240 M7".into(),
                serial: "FCH1234".into(),
                power_state: "on".into(),
                firmware: "4.2(3a)".into(),
            },
            ServerSummary {
                name: "rack-02".into(),
                model: "UCS C240 M7".into(),
                serial: "FCH5678".into(),
                power_state: "on".into(),
                firmware: "4.3(1b)".into(),
            },
        ])
    }

    async fn virtual_machines(&self) -> Result<Vec<VmSummary>, ToolError> {
        self.gate()?;
        Ok(vec![VmSummary {
            name: "build-runner".into(),
            power_state: "poweredOn".into(),
            cpu_count: 8,
            memory_mib: 32_768,
            host: "rack-01".into(),
        }])
    }

    async fn device_connectors(&self) -> Result<Vec<ConnectorSummary>, ToolError> {
        self.gate()?;
        Ok(vec![ConnectorSummary {
            device_id: "dc-rack-01".into(),
            platform: "UCSFI".into(),
            connection_status: "Connected".into(),
        }])
    }

    async fn network_elements(&self) -> Result<Vec<NetworkElementSummary>, ToolError> {
        self.gate()?;
        Ok(vec![NetworkElementSummary {
            name: "fi-a".into(),
            model: "UCS-FI-6454".into(),
            serial: "FDO2222".into(),
            management_ip: "10.0.0.10".into(),
            version: "4.2(3c)".into(),
        }])
    }

    async fn health_alerts(&self) -> Result<Vec<AlarmSummary>, ToolError> {
        self.gate()?;
        Ok(vec![AlarmSummary {
            severity: "Warning".into(),
            description: "PSU redundancy lost".into(),
            affected_object: "rack-02".into(),
            created_at: "2026-08-20T11:02:00Z".into(),
        }])
    }

    async fn server_profiles(&self) -> Result<Vec<ProfileSummary>, ToolError> {
        self.gate()?;
        Ok(vec![ProfileSummary {
            name: "esx-profile".into(),
            state: "OK".into(),
            assigned_server: "rack-01".into(),
        }])
    }

    async fn latest_firmware(&self, model: &str) -> Result<Option<String>, ToolError> {
        self.gate()?;
        Ok((model == "UCS C240 M7").then(|| "4.3(1b)".to_string()))
    }
}

/// Fabric controller double with one site, two devices, and one alarm.
pub struct CannedFabric {
    fail: bool,
}

impl CannedFabric {
    pub fn healthy() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }

    fn gate(&self) -> Result<(), ToolError> {
        if self.fail {
            return Err(outage("fabric controller"));
        }
        Ok(())
    }
}

#[async_trait]
impl FabricApi for CannedFabric {
    async fn sites(&self) -> Result<Vec<SiteSummary>, ToolError> {
        self.gate()?;
        Ok(vec![SiteSummary {
            name: "fra-1".into(),
            location: "Frankfurt".into(),
            health: "healthy".into(),
        }])
    }

    async fn fabrics(&self) -> Result<Vec<FabricSummary>, ToolError> {
        self.gate()?;
        Ok(vec![FabricSummary {
            name: "prod-fabric".into(),
            fabric_type: "VXLAN EVPN".into(),
            site: "fra-1".into(),
            health: "healthy".into(),
        }])
    }

    async fn devices(&self) -> Result<Vec<DeviceSummary>, ToolError> {
        self.gate()?;
        Ok(vec![
            DeviceSummary {
                name: "spine-1".into(),
                role: "spine".into(),
                model: "N9K-C9336C".into(),
                serial: "FDO9999".into(),
                health: "healthy".into(),
            },
            DeviceSummary {
                name: "leaf-1".into(),
                role: "leaf".into(),
                model: "N9K-C93180YC".into(),
                serial: "FDO8888".into(),
                health: "healthy".into(),
            },
        ])
    }

    async fn telemetry(&self, kind: TelemetryKind) -> Result<Vec<TelemetrySample>, ToolError> {
        self.gate()?;
        Ok(vec![TelemetrySample {
            device: "spine-1".into(),
            metric: kind.as_str().to_string(),
            average: 41.5,
            peak: 88.0,
        }])
    }

    async fn alarms(&self, severity: AlarmSeverity) -> Result<Vec<FabricAlarm>, ToolError> {
        self.gate()?;
        Ok(vec![FabricAlarm {
            severity: severity.as_str().to_string(),
            message: "BGP session down".into(),
            source: "leaf-1".into(),
            raised_at: "2026-08-21T04:40:00Z".into(),
        }])
    }

    async fn workflows(&self) -> Result<Vec<WorkflowSummary>, ToolError> {
        self.gate()?;
        Ok(vec![WorkflowSummary {
            name: "fabric-upgrade".into(),
            status: "COMPLETED".into(),
            started_at: "2026-08-19T22:00:00Z".into(),
        }])
    }
}
