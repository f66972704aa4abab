//! Scrape target discovery across the cluster
//!
//! This module handles:
//! - Host storages straight from the storage listing
//! - Running VMs and their guest agent addresses
//! - Containers and their interface addresses
//! - The IPv4 allow-list applied to every discovered address

use crate::inventory::{
    ClusterInventory, ClusterNode, Guest, GuestKind, GuestSummary, InventoryError, Storage,
};
use async_stream::stream;
use futures::Stream;
use tracing::{debug, info, warn};

/// Addresses that never carry a reachable exporter
const LOOPBACK_ADDRESSES: &[&str] = &["127.0.0.1", "::1"];

/// Target classification used for finding tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Host,
    Vm,
    Container,
}

impl TargetKind {
    pub fn tag(self) -> &'static str {
        match self {
            TargetKind::Host => "HOST",
            TargetKind::Vm => "VM",
            TargetKind::Container => "CT",
        }
    }
}

impl From<GuestKind> for TargetKind {
    fn from(kind: GuestKind) -> Self {
        match kind {
            GuestKind::Vm => TargetKind::Vm,
            GuestKind::Container => TargetKind::Container,
        }
    }
}

/// One thing to measure: a host storage, or one address of a guest
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeCandidate {
    HostStorage {
        node: String,
        storage: Storage,
    },
    Guest {
        kind: GuestKind,
        id: u32,
        name: String,
        address: String,
    },
}

impl ScrapeCandidate {
    pub fn kind(&self) -> TargetKind {
        match self {
            ScrapeCandidate::HostStorage { .. } => TargetKind::Host,
            ScrapeCandidate::Guest { kind, .. } => (*kind).into(),
        }
    }

    /// Display label, e.g. `pve1 storage local` or `web01 (10.0.0.5)`
    pub fn subject(&self) -> String {
        match self {
            ScrapeCandidate::HostStorage { node, storage } => {
                format!("{} storage {}", node, storage.name)
            }
            ScrapeCandidate::Guest { name, address, .. } => format!("{} ({})", name, address),
        }
    }
}

/// Conservative IPv4 allow-list, not a full address validation
pub fn is_scrapeable_address(address: &str) -> bool {
    !address.is_empty()
        && !LOOPBACK_ADDRESSES.contains(&address)
        && !address.contains(':')
        && address.matches('.').count() == 3
}

/// Walks the inventory and yields scrape candidates
pub struct TargetDiscovery<'a, I: ?Sized> {
    inventory: &'a I,
}

impl<'a, I> TargetDiscovery<'a, I>
where
    I: ClusterInventory + ?Sized,
{
    pub fn new(inventory: &'a I) -> Self {
        Self { inventory }
    }

    pub async fn nodes(&self) -> Result<Vec<ClusterNode>, InventoryError> {
        let nodes = self.inventory.list_nodes().await?;
        info!("Discovered {} cluster nodes", nodes.len());
        Ok(nodes)
    }

    /// Lazy candidate sequence for one node: storages, then VMs, then containers.
    ///
    /// Listing failures drop that section of the node; guests without a
    /// usable address are skipped.
    pub fn candidates<'s>(&'s self, node: &'s str) -> impl Stream<Item = ScrapeCandidate> + 's {
        let discovery: TargetDiscovery<'s, I> = TargetDiscovery::new(self.inventory);

        stream! {
            match discovery.inventory.list_storages(node).await {
                Ok(storages) => {
                    for storage in storages {
                        yield ScrapeCandidate::HostStorage { node: node.to_string(), storage };
                    }
                }
                Err(e) => warn!("Failed to list storages on {}: {}", node, e),
            }

            match discovery.inventory.list_vms(node).await {
                Ok(vms) => {
                    for vm in vms {
                        if let Some(guest) = discovery.vm_guest(node, &vm).await {
                            for candidate in guest_candidates(guest) {
                                yield candidate;
                            }
                        }
                    }
                }
                Err(e) => warn!("Failed to list VMs on {}: {}", node, e),
            }

            match discovery.inventory.list_containers(node).await {
                Ok(containers) => {
                    for container in containers {
                        if let Some(guest) = discovery.container_guest(node, &container).await {
                            for candidate in guest_candidates(guest) {
                                yield candidate;
                            }
                        }
                    }
                }
                Err(e) => warn!("Failed to list containers on {}: {}", node, e),
            }
        }
    }

    /// Running VM with at least one scrapeable agent address
    pub async fn vm_guest(&self, node: &str, vm: &GuestSummary) -> Option<Guest> {
        if !vm.is_running() {
            debug!("Skipping VM {} ({}): not running", vm.name, vm.vmid);
            return None;
        }

        let interfaces = match self.inventory.vm_agent_interfaces(node, vm.vmid).await {
            Ok(interfaces) if !interfaces.is_empty() => interfaces,
            Ok(_) => {
                info!("VM {} ({}): guest agent reported no interfaces", vm.name, vm.vmid);
                return None;
            }
            Err(e) => {
                info!("VM {} ({}): guest agent unavailable: {}", vm.name, vm.vmid, e);
                return None;
            }
        };

        let addresses = interfaces
            .iter()
            .flat_map(|iface| iface.addresses())
            .filter(|address| is_scrapeable_address(address))
            .map(String::from)
            .collect();

        with_addresses(vm, GuestKind::Vm, addresses)
    }

    /// Container with at least one scrapeable address.
    ///
    /// The run state is not checked here: stopped containers simply end up
    /// without addresses or without a reachable exporter.
    pub async fn container_guest(&self, node: &str, ct: &GuestSummary) -> Option<Guest> {
        let interfaces = match self.inventory.container_interfaces(node, ct.vmid).await {
            Ok(interfaces) => interfaces,
            Err(e) => {
                info!("CT {} ({}): interface listing failed: {}", ct.name, ct.vmid, e);
                return None;
            }
        };

        let addresses = interfaces
            .iter()
            .flat_map(|iface| iface.addresses())
            .filter(|address| is_scrapeable_address(address))
            .map(String::from)
            .collect();

        with_addresses(ct, GuestKind::Container, addresses)
    }
}

fn with_addresses(summary: &GuestSummary, kind: GuestKind, addresses: Vec<String>) -> Option<Guest> {
    if addresses.is_empty() {
        debug!("Skipping {} ({}): no scrapeable address", summary.name, summary.vmid);
        return None;
    }

    Some(Guest {
        id: summary.vmid,
        name: summary.name.clone(),
        kind,
        addresses,
    })
}

fn guest_candidates(guest: Guest) -> impl Iterator<Item = ScrapeCandidate> {
    let Guest { id, name, kind, addresses } = guest;
    addresses.into_iter().map(move |address| ScrapeCandidate::Guest {
        kind,
        id,
        name: name.clone(),
        address,
    })
}
