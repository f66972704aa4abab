/*!
Stub cluster inventory for tests without a Proxmox cluster

Nodes, storages and guests are declared with a small builder. Every call the
pipeline makes is recorded so tests can assert what was (not) queried.
*/

use async_trait::async_trait;
use diskwatch_core::inventory::{
    AgentInterface, AgentInterfaces, ClusterInventory, ClusterNode, ContainerInterface,
    GuestSummary, InventoryError, Storage,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Inventory call as seen by the stub
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryCall {
    ListNodes,
    ListStorages(String),
    ListVms(String),
    ListContainers(String),
    VmAgent(String, u32),
    ContainerInterfaces(String, u32),
}

/// Per-node listing that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Listing {
    Storages,
    Vms,
    Containers,
}

#[derive(Debug, Default, Clone)]
struct NodeFixture {
    storages: Vec<Storage>,
    vms: Vec<GuestSummary>,
    containers: Vec<GuestSummary>,
    agents: HashMap<u32, Vec<AgentInterface>>,
    container_ifaces: HashMap<u32, Vec<ContainerInterface>>,
    failing: HashSet<Listing>,
}

/// Cluster inventory served from memory
#[derive(Debug, Clone, Default)]
pub struct StubInventory {
    nodes: Vec<(String, NodeFixture)>,
    fail_nodes: bool,
    calls: Arc<Mutex<Vec<InventoryCall>>>,
}

impl StubInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a node (idempotent; nodes keep declaration order)
    pub fn node(mut self, node: &str) -> Self {
        self.fixture_mut(node);
        self
    }

    pub fn storage(mut self, node: &str, name: &str, used: Option<u64>, total: Option<u64>) -> Self {
        self.fixture_mut(node).storages.push(Storage {
            name: name.to_string(),
            used,
            total,
        });
        self
    }

    pub fn vm(mut self, node: &str, vmid: u32, name: &str, status: &str) -> Self {
        self.fixture_mut(node).vms.push(guest(vmid, name, status));
        self
    }

    /// Raw agent payload, bare list or `{"result": [...]}`
    pub fn vm_agent(mut self, node: &str, vmid: u32, payload: Value) -> Self {
        let interfaces: AgentInterfaces =
            serde_json::from_value(payload).expect("invalid guest agent fixture");
        self.fixture_mut(node)
            .agents
            .insert(vmid, interfaces.into_interfaces());
        self
    }

    /// Agent answering with a single `eth0` carrying `addresses`
    pub fn vm_agent_addresses(self, node: &str, vmid: u32, addresses: &[&str]) -> Self {
        let ip_addresses: Vec<Value> = addresses
            .iter()
            .map(|ip| serde_json::json!({"ip-address": ip, "ip-address-type": "ipv4"}))
            .collect();
        self.vm_agent(
            node,
            vmid,
            serde_json::json!({"result": [{"name": "eth0", "ip-addresses": ip_addresses}]}),
        )
    }

    pub fn container(mut self, node: &str, ctid: u32, name: &str, status: &str) -> Self {
        self.fixture_mut(node).containers.push(guest(ctid, name, status));
        self
    }

    /// One `ethN` per entry, in CIDR form like the API (`10.0.0.9/24`)
    pub fn container_addresses(mut self, node: &str, ctid: u32, inet: &[&str]) -> Self {
        let interfaces = inet
            .iter()
            .enumerate()
            .map(|(i, cidr)| ContainerInterface {
                name: format!("eth{}", i),
                inet: Some(cidr.to_string()),
                inet6: None,
                hwaddr: None,
            })
            .collect();
        self.fixture_mut(node).container_ifaces.insert(ctid, interfaces);
        self
    }

    pub fn failing_listing(mut self, node: &str, listing: Listing) -> Self {
        self.fixture_mut(node).failing.insert(listing);
        self
    }

    pub fn failing_nodes(mut self) -> Self {
        self.fail_nodes = true;
        self
    }

    pub fn calls(&self) -> Vec<InventoryCall> {
        self.calls.lock().clone()
    }

    pub fn was_called(&self, call: &InventoryCall) -> bool {
        self.calls.lock().contains(call)
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn fixture_mut(&mut self, node: &str) -> &mut NodeFixture {
        let index = match self.nodes.iter().position(|(name, _)| name == node) {
            Some(index) => index,
            None => {
                self.nodes.push((node.to_string(), NodeFixture::default()));
                self.nodes.len() - 1
            }
        };
        &mut self.nodes[index].1
    }

    fn fixture(&self, node: &str) -> Option<&NodeFixture> {
        self.nodes
            .iter()
            .find(|(name, _)| name == node)
            .map(|(_, fixture)| fixture)
    }

    fn record(&self, call: InventoryCall) {
        self.calls.lock().push(call);
    }

    fn listing<T: Clone>(
        &self,
        node: &str,
        listing: Listing,
        select: impl Fn(&NodeFixture) -> &Vec<T>,
    ) -> Result<Vec<T>, InventoryError> {
        match self.fixture(node) {
            Some(fixture) if fixture.failing.contains(&listing) => Err(InventoryError::Status {
                status: 595,
                path: format!("/nodes/{}/{:?}", node, listing).to_lowercase(),
            }),
            Some(fixture) => Ok(select(fixture).clone()),
            None => Err(InventoryError::Status {
                status: 500,
                path: format!("/nodes/{}", node),
            }),
        }
    }
}

#[async_trait]
impl ClusterInventory for StubInventory {
    async fn list_nodes(&self) -> Result<Vec<ClusterNode>, InventoryError> {
        self.record(InventoryCall::ListNodes);
        if self.fail_nodes {
            return Err(InventoryError::Status {
                status: 401,
                path: "/nodes".to_string(),
            });
        }

        Ok(self
            .nodes
            .iter()
            .map(|(name, _)| ClusterNode {
                node: name.clone(),
                status: Some("online".to_string()),
            })
            .collect())
    }

    async fn list_storages(&self, node: &str) -> Result<Vec<Storage>, InventoryError> {
        self.record(InventoryCall::ListStorages(node.to_string()));
        self.listing(node, Listing::Storages, |f| &f.storages)
    }

    async fn list_vms(&self, node: &str) -> Result<Vec<GuestSummary>, InventoryError> {
        self.record(InventoryCall::ListVms(node.to_string()));
        self.listing(node, Listing::Vms, |f| &f.vms)
    }

    async fn list_containers(&self, node: &str) -> Result<Vec<GuestSummary>, InventoryError> {
        self.record(InventoryCall::ListContainers(node.to_string()));
        self.listing(node, Listing::Containers, |f| &f.containers)
    }

    async fn vm_agent_interfaces(
        &self,
        node: &str,
        vmid: u32,
    ) -> Result<Vec<AgentInterface>, InventoryError> {
        self.record(InventoryCall::VmAgent(node.to_string(), vmid));
        self.fixture(node)
            .and_then(|fixture| fixture.agents.get(&vmid).cloned())
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
        self.record(InventoryCall::ContainerInterfaces(node.to_string(), ctid));
        Ok(self
            .fixture(node)
            .and_then(|fixture| fixture.container_ifaces.get(&ctid).cloned())
            .unwrap_or_default())
    }
}

fn guest(vmid: u32, name: &str, status: &str) -> GuestSummary {
    GuestSummary {
        vmid,
        name: name.to_string(),
        status: Some(status.to_string()),
    }
}
