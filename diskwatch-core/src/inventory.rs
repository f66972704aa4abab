//! Cluster inventory records and the client interface the scan walks
//!
//! Records mirror the Proxmox VE API payloads:
//! - `/nodes` and `/nodes/{node}/storage`
//! - `/nodes/{node}/qemu` plus the guest agent `network-get-interfaces` call
//! - `/nodes/{node}/lxc` plus `/nodes/{node}/lxc/{vmid}/interfaces`

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

/// Errors raised by an inventory client
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status} for {path}")]
    Status { status: u16, path: String },
    #[error("Invalid payload for {path}: {source}")]
    Payload {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Guest agent not available for {node}/{vmid}")]
    AgentUnavailable { node: String, vmid: u32 },
}

/// A hypervisor host (`/nodes` item)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClusterNode {
    pub node: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Host-level storage as reported by the cluster API
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Storage {
    #[serde(rename = "storage", default = "unknown_storage")]
    pub name: String,
    #[serde(default)]
    pub used: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// VM or container entry from the `qemu` / `lxc` listings
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GuestSummary {
    #[serde(deserialize_with = "vmid_from_number_or_string")]
    pub vmid: u32,
    #[serde(default = "unknown_guest")]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl GuestSummary {
    pub fn is_running(&self) -> bool {
        self.status.as_deref() == Some("running")
    }
}

/// Guest kind, also used to tag scrape candidates and findings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestKind {
    Vm,
    Container,
}

/// A guest with the addresses discovery found for it
#[derive(Debug, Clone, PartialEq)]
pub struct Guest {
    pub id: u32,
    pub name: String,
    pub kind: GuestKind,
    pub addresses: Vec<String>,
}

/// Guest agent `network-get-interfaces` response.
///
/// Depending on the API version the interface list arrives bare or wrapped
/// in a `result` object. Both shapes are accepted and flattened by
/// [`AgentInterfaces::into_interfaces`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AgentInterfaces {
    Wrapped { result: Vec<AgentInterface> },
    Bare(Vec<AgentInterface>),
}

impl AgentInterfaces {
    pub fn into_interfaces(self) -> Vec<AgentInterface> {
        match self {
            AgentInterfaces::Wrapped { result } => result,
            AgentInterfaces::Bare(interfaces) => interfaces,
        }
    }
}

/// One interface reported by the QEMU guest agent
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentInterface {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "ip-addresses", default)]
    pub ip_addresses: Vec<AgentIpAddress>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentIpAddress {
    #[serde(rename = "ip-address", default)]
    pub address: Option<String>,
    #[serde(rename = "ip-address-type", default)]
    pub address_type: Option<String>,
    #[serde(default)]
    pub prefix: Option<u8>,
}

impl AgentInterface {
    /// Addresses in agent order; absent entries are dropped
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.ip_addresses
            .iter()
            .filter_map(|ip| ip.address.as_deref())
    }
}

/// One interface from the container `interfaces` listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContainerInterface {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inet: Option<String>,
    #[serde(default)]
    pub inet6: Option<String>,
    #[serde(default)]
    pub hwaddr: Option<String>,
}

impl ContainerInterface {
    /// `inet` then `inet6`, with the CIDR prefix length removed
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        [self.inet.as_deref(), self.inet6.as_deref()]
            .into_iter()
            .flatten()
            .map(|cidr| cidr.split('/').next().unwrap_or(cidr))
    }
}

/// Read-only view of the cluster the scan needs.
///
/// `vm_agent_interfaces` failing is routine (agent missing or stopped);
/// callers treat it as "no addresses", never as a fatal error.
#[async_trait]
pub trait ClusterInventory: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<ClusterNode>, InventoryError>;

    async fn list_storages(&self, node: &str) -> Result<Vec<Storage>, InventoryError>;

    async fn list_vms(&self, node: &str) -> Result<Vec<GuestSummary>, InventoryError>;

    async fn list_containers(&self, node: &str) -> Result<Vec<GuestSummary>, InventoryError>;

    async fn vm_agent_interfaces(
        &self,
        node: &str,
        vmid: u32,
    ) -> Result<Vec<AgentInterface>, InventoryError>;

    async fn container_interfaces(
        &self,
        node: &str,
        ctid: u32,
    ) -> Result<Vec<ContainerInterface>, InventoryError>;
}

fn unknown_storage() -> String {
    "unknown-storage".to_string()
}

fn unknown_guest() -> String {
    "unknown".to_string()
}

// Older PVE releases send the LXC vmid as a string
fn vmid_from_number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawVmid {
        Number(u32),
        Text(String),
    }

    match RawVmid::deserialize(deserializer)? {
        RawVmid::Number(id) => Ok(id),
        RawVmid::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
