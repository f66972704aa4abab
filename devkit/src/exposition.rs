/*!
Node exporter payloads and a metrics source that serves them

`ExpositionBuilder` writes text exposition the way node_exporter does
(`# HELP` / `# TYPE` headers, one labelled sample per line) so parser and
pipeline tests run against realistic input.
*/

use async_trait::async_trait;
use diskwatch_core::metrics::{FILESYSTEM_AVAIL, FILESYSTEM_SIZE};
use diskwatch_core::scraper::{MetricsSource, ScrapeError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Builder for exporter text payloads
#[derive(Debug, Default, Clone)]
pub struct ExpositionBuilder {
    size_lines: Vec<String>,
    avail_lines: Vec<String>,
    extra_lines: Vec<String>,
}

impl ExpositionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size and avail samples for one mounted filesystem
    pub fn filesystem(mut self, device: &str, mountpoint: &str, size: u64, avail: u64) -> Self {
        let labels = format!(
            "device=\"{}\",fstype=\"ext4\",mountpoint=\"{}\"",
            device, mountpoint
        );
        self.size_lines
            .push(format!("{}{{{}}} {}", FILESYSTEM_SIZE, labels, size));
        self.avail_lines
            .push(format!("{}{{{}}} {}", FILESYSTEM_AVAIL, labels, avail));
        self
    }

    pub fn root(self, size: u64, avail: u64) -> Self {
        self.filesystem("/dev/sda1", "/", size, avail)
    }

    /// Appended verbatim after the filesystem families
    pub fn raw_line(mut self, line: &str) -> Self {
        self.extra_lines.push(line.to_string());
        self
    }

    pub fn build(&self) -> String {
        let mut out = String::new();

        if !self.size_lines.is_empty() {
            out.push_str(&format!(
                "# HELP {} Filesystem size in bytes.\n# TYPE {} gauge\n",
                FILESYSTEM_SIZE, FILESYSTEM_SIZE
            ));
            for line in &self.size_lines {
                out.push_str(line);
                out.push('\n');
            }
        }

        if !self.avail_lines.is_empty() {
            out.push_str(&format!(
                "# HELP {} Filesystem space available to non-root users in bytes.\n# TYPE {} gauge\n",
                FILESYSTEM_AVAIL, FILESYSTEM_AVAIL
            ));
            for line in &self.avail_lines {
                out.push_str(line);
                out.push('\n');
            }
        }

        for line in &self.extra_lines {
            out.push_str(line);
            out.push('\n');
        }

        out
    }
}

/// Payload with a root filesystem plus a `/boot` decoy
pub fn root_filesystem_payload(size: u64, avail: u64) -> String {
    ExpositionBuilder::new()
        .filesystem("/dev/sda2", "/boot", 512, 1)
        .root(size, avail)
        .build()
}

/// Metrics source keyed by address; unknown addresses are unreachable
#[derive(Debug, Clone, Default)]
pub struct StubMetricsSource {
    payloads: Arc<Mutex<HashMap<String, String>>>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl StubMetricsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(self, address: &str, payload: impl Into<String>) -> Self {
        self.payloads
            .lock()
            .insert(address.to_string(), payload.into());
        self
    }

    /// Addresses fetched so far, in order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl MetricsSource for StubMetricsSource {
    async fn fetch(&self, address: &str) -> Result<String, ScrapeError> {
        self.fetched.lock().push(address.to_string());
        self.payloads
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| ScrapeError::Unreachable(address.to_string()))
    }
}
