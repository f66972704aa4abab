//! One scan of the cluster, then at most one notification
//!
//! Everything runs sequentially: nodes in inventory order, and per node
//! storages, VMs, then containers. Each candidate is scraped before the next
//! one is discovered.

use crate::alerts::{AlertAggregator, Finding};
use crate::discovery::TargetDiscovery;
use crate::inventory::{ClusterInventory, InventoryError};
use crate::notifier::{AlertMessage, Notifier, NotifyError};
use crate::scraper::{DiskUsageScraper, MetricsSource, UsageReading};
use futures::StreamExt;
use serde::Serialize;
use std::pin::pin;
use tracing::{debug, info};

/// Result of a completed scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub nodes: usize,
    pub candidates: usize,
    pub readings: usize,
    pub unknown: usize,
    pub skipped: usize,
    pub findings: Vec<Finding>,
}

impl RunReport {
    pub fn has_alerts(&self) -> bool {
        !self.findings.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    AlertSent,
    NoAlerts,
}

impl RunOutcome {
    /// One-line summary printed at the end of a run
    pub fn summary(self) -> &'static str {
        match self {
            RunOutcome::AlertSent => "Alert email sent.",
            RunOutcome::NoAlerts => "No disk alerts.",
        }
    }
}

/// Alert delivery failed; the findings it was carrying are kept
#[derive(Debug, thiserror::Error)]
#[error("Failed to deliver {} disk alert(s): {source}", .findings.len())]
pub struct DeliveryError {
    pub findings: Vec<Finding>,
    #[source]
    pub source: NotifyError,
}

/// Walk the whole cluster and collect findings at or above `threshold`.
///
/// Only a failed node listing aborts the scan.
pub async fn scan<I, S>(
    inventory: &I,
    scraper: &DiskUsageScraper<S>,
    threshold: f64,
) -> Result<RunReport, InventoryError>
where
    I: ClusterInventory + ?Sized,
    S: MetricsSource,
{
    let discovery = TargetDiscovery::new(inventory);
    let mut aggregator = AlertAggregator::new(threshold);
    let mut report = RunReport::default();

    for node in discovery.nodes().await? {
        info!("Node: {} (disk usage)", node.node);
        report.nodes += 1;

        let mut candidates = pin!(discovery.candidates(&node.node));
        while let Some(candidate) = candidates.next().await {
            report.candidates += 1;

            let Some(reading) = scraper.scrape(&candidate).await else {
                report.skipped += 1;
                continue;
            };

            log_reading(&reading);
            report.readings += 1;
            if reading.percent.is_none() {
                report.unknown += 1;
            }
            aggregator.record(&reading);
        }
    }

    report.findings = aggregator.into_findings();
    info!(
        "Scan complete: {} nodes, {} readings ({} unknown), {} skipped, {} findings",
        report.nodes,
        report.readings,
        report.unknown,
        report.skipped,
        report.findings.len()
    );
    if tracing::enabled!(tracing::Level::DEBUG) {
        match serde_json::to_string(&report) {
            Ok(json) => debug!("Run report: {}", json),
            Err(e) => debug!("Run report not serializable: {}", e),
        }
    }
    Ok(report)
}

/// Send the alert if the scan produced findings
pub async fn deliver<N>(
    notifier: &N,
    message: &AlertMessage,
    report: &RunReport,
) -> Result<RunOutcome, DeliveryError>
where
    N: Notifier + ?Sized,
{
    if !report.has_alerts() {
        debug!("No findings, nothing to send");
        return Ok(RunOutcome::NoAlerts);
    }

    let subject = message.subject();
    let body = message.body(&report.findings);

    notifier
        .send(&subject, &body)
        .await
        .map_err(|source| DeliveryError {
            findings: report.findings.clone(),
            source,
        })?;

    info!("Sent alert with {} findings", report.findings.len());
    Ok(RunOutcome::AlertSent)
}

fn log_reading(reading: &UsageReading) {
    match reading.percent {
        Some(percent) => info!("- {} {}: {}", reading.kind.tag(), reading.subject, percent),
        None => info!("- {} {}: unknown", reading.kind.tag(), reading.subject),
    }
}
