//! Disk usage readings per scrape candidate
//!
//! Host storages are computed from inventory figures; guests are measured
//! through their node exporter. Unreachable exporters are routine (exporter
//! not installed, firewall, guest shutting down) and only skip the candidate.

use crate::discovery::{ScrapeCandidate, TargetKind};
use crate::metrics::{percentage_used, Percent, RootFilesystem};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default node exporter port
pub const EXPORTER_PORT: u16 = 9100;
/// Default per-request scrape timeout
pub const SCRAPE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Exporter at {url} answered {status}")]
    Status { url: String, status: u16 },
    #[error("No exporter reachable at {0}")]
    Unreachable(String),
}

/// Fetches the raw exporter payload for an address
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self, address: &str) -> Result<String, ScrapeError>;
}

/// `GET http://<address>:<port>/metrics` with a bounded timeout
pub struct HttpMetricsSource {
    client: reqwest::Client,
    port: u16,
}

impl HttpMetricsSource {
    pub fn new(port: u16, timeout: Duration) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self { client, port })
    }

    pub fn endpoint(&self, address: &str) -> String {
        format!("http://{}:{}/metrics", address, self.port)
    }
}

#[async_trait]
impl MetricsSource for HttpMetricsSource {
    async fn fetch(&self, address: &str) -> Result<String, ScrapeError> {
        let url = self.endpoint(address);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ScrapeError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Usage figure for one candidate; `percent` is `None` when unmeasurable
#[derive(Debug, Clone, PartialEq)]
pub struct UsageReading {
    pub kind: TargetKind,
    pub subject: String,
    pub percent: Option<Percent>,
}

pub struct DiskUsageScraper<S> {
    source: S,
}

impl<S: MetricsSource> DiskUsageScraper<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Measure one candidate. `None` means the candidate was skipped.
    pub async fn scrape(&self, candidate: &ScrapeCandidate) -> Option<UsageReading> {
        let percent = match candidate {
            ScrapeCandidate::HostStorage { storage, .. } => percentage_used(
                storage.used.map(|bytes| bytes as f64),
                storage.total.map(|bytes| bytes as f64),
            ),
            ScrapeCandidate::Guest { address, .. } => {
                let payload = match self.source.fetch(address).await {
                    Ok(payload) => payload,
                    Err(e) => {
                        info!("Skipping {}: {}", candidate.subject(), e);
                        return None;
                    }
                };

                match RootFilesystem::parse(&payload) {
                    Ok(root) => {
                        debug!(
                            "{}: size={:?} avail={:?}",
                            candidate.subject(),
                            root.size_bytes,
                            root.avail_bytes
                        );
                        root.percent_used()
                    }
                    Err(e) => {
                        warn!("Unreadable exporter payload from {}: {}", candidate.subject(), e);
                        None
                    }
                }
            }
        };

        Some(UsageReading {
            kind: candidate.kind(),
            subject: candidate.subject(),
            percent,
        })
    }
}
