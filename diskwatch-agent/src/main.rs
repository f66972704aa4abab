//! pve-diskwatch - Disk exhaustion watchdog for a Proxmox VE cluster
//!
//! One run of this binary:
//! - Loads configuration (TOML file, `.env`, environment)
//! - Walks every node's storages, VMs and containers
//! - Reads root filesystem usage from each guest's node exporter
//! - Mails a single alert listing every target at or above the threshold

mod config;
mod mailer;
mod proxmox;

use anyhow::{Context, Result};
use config::MonitorConfig;
use diskwatch_core::{deliver, scan, AlertMessage, DiskUsageScraper, HttpMetricsSource};
use mailer::SmtpNotifier;
use proxmox::ProxmoxClient;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env if present (absent is fine)
    dotenvy::dotenv().ok();

    // Initialize logging; stdout is kept for the run summary
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("diskwatch_core=info,pve_diskwatch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("pve-diskwatch v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = MonitorConfig::load()
        .await
        .context("Failed to load configuration")?;

    let inventory =
        ProxmoxClient::new(&config.cluster).context("Failed to create Proxmox API client")?;
    let source = HttpMetricsSource::new(config.scrape.port, config.scrape_timeout())
        .context("Failed to create exporter HTTP client")?;
    let scraper = DiskUsageScraper::new(source);
    let notifier = SmtpNotifier::new(&config.mail).context("Failed to configure SMTP notifier")?;

    let report = scan(&inventory, &scraper, config.alert.threshold)
        .await
        .context("Cluster scan failed")?;

    let message = AlertMessage::new(config.alert.service_name.as_str(), config.alert.threshold);
    let outcome = deliver(&notifier, &message, &report)
        .await
        .inspect_err(|e| {
            for finding in &e.findings {
                error!("Undelivered alert: {}", finding);
            }
        })
        .context("Alert delivery failed")?;

    println!("{}", outcome.summary());
    Ok(())
}
