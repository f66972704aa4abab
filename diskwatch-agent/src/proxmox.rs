//! Proxmox VE API client backing the cluster inventory
//!
//! Token authentication only (`PVEAPIToken=<user>!<token>=<secret>`); every
//! response is unwrapped from the API's `{"data": ...}` envelope.

use crate::config::ClusterConfig;
use async_trait::async_trait;
use diskwatch_core::inventory::{
    AgentInterface, AgentInterfaces, ClusterInventory, ClusterNode, ContainerInterface,
    GuestSummary, InventoryError, Storage,
};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const API_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    data: T,
}

pub struct ProxmoxClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: String,
}

impl ProxmoxClient {
    pub fn new(config: &ClusterConfig) -> Result<Self, InventoryError> {
        Self::with_base_url(config.base_url(), config)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        config: &ClusterConfig,
    ) -> Result<Self, InventoryError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_ssl)
            .timeout(API_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_header: format!(
                "PVEAPIToken={}!{}={}",
                config.user, config.token_name, config.token_secret
            ),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, InventoryError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, &self.auth_header)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(InventoryError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        let body = response.text().await?;
        let envelope: ApiEnvelope<T> =
            serde_json::from_str(&body).map_err(|source| InventoryError::Payload {
                path: path.to_string(),
                source,
            })?;

        Ok(envelope.data)
    }
}

#[async_trait]
impl ClusterInventory for ProxmoxClient {
    async fn list_nodes(&self) -> Result<Vec<ClusterNode>, InventoryError> {
        self.get("/nodes").await
    }

    async fn list_storages(&self, node: &str) -> Result<Vec<Storage>, InventoryError> {
        self.get(&format!("/nodes/{}/storage", node)).await
    }

    async fn list_vms(&self, node: &str) -> Result<Vec<GuestSummary>, InventoryError> {
        self.get(&format!("/nodes/{}/qemu", node)).await
    }

    async fn list_containers(&self, node: &str) -> Result<Vec<GuestSummary>, InventoryError> {
        self.get(&format!("/nodes/{}/lxc", node)).await
    }

    async fn vm_agent_interfaces(
        &self,
        node: &str,
        vmid: u32,
    ) -> Result<Vec<AgentInterface>, InventoryError> {
        let path = format!("/nodes/{}/qemu/{}/agent/network-get-interfaces", node, vmid);
        let response: Option<AgentInterfaces> = self.get(&path).await?;

        response
            .map(AgentInterfaces::into_interfaces)
            .ok_or_else(|| InventoryError::AgentUnavailable {
                node: node.to_string(),
                vmid,
            })
    }

    async fn container_interfaces(
        &self,
        node: &str,
        ctid: u32,
    ) -> Result<Vec<ContainerInterface>, InventoryError> {
        let path = format!("/nodes/{}/lxc/{}/interfaces", node, ctid);
        let interfaces: Option<Vec<ContainerInterface>> = self.get(&path).await?;
        Ok(interfaces.unwrap_or_default())
    }
}
