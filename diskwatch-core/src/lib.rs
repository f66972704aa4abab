//! Disk usage scan pipeline for a Proxmox VE cluster
//!
//! Data flow of one run:
//! - `discovery` walks the inventory into scrape candidates
//! - `scraper` measures each candidate (inventory figures or node exporter)
//! - `alerts` keeps the readings at or above the threshold
//! - `monitor` drives the above and hands findings to a `Notifier`

pub mod alerts;
pub mod discovery;
pub mod inventory;
pub mod metrics;
pub mod monitor;
pub mod notifier;
pub mod scraper;

pub use alerts::{AlertAggregator, Finding, DEFAULT_THRESHOLD};
pub use discovery::{ScrapeCandidate, TargetDiscovery, TargetKind};
pub use inventory::{ClusterInventory, InventoryError};
pub use monitor::{deliver, scan, DeliveryError, RunOutcome, RunReport};
pub use notifier::{AlertMessage, Notifier, NotifyError, DEFAULT_SERVICE_NAME};
pub use scraper::{DiskUsageScraper, HttpMetricsSource, MetricsSource, ScrapeError, UsageReading};
