//! Node exporter payload parsing
//!
//! Reads the Prometheus text exposition served on `:9100/metrics`:
//! - Root filesystem size and available bytes
//! - Lookup by plain substring match, no full exposition grammar
//! - "not found" kept distinct from a zero value

pub mod usage;


pub use usage::{derive_used, percentage_used, Percent};

/// Filesystem size sample name
pub const FILESYSTEM_SIZE: &str = "node_filesystem_size_bytes";
/// Filesystem available-bytes sample name
pub const FILESYSTEM_AVAIL: &str = "node_filesystem_avail_bytes";

const ROOT_MOUNT_LABEL: &str = r#"mountpoint="/""#;

/// Errors raised while reading a sample value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Sample {metric} has non-numeric value {token:?}")]
    NonNumeric { metric: String, token: String },
}

/// Value of the first `metric` sample labelled `mountpoint="/"`.
///
/// Returns `Ok(None)` when no such line exists. The value is the last
/// whitespace-separated token of the line.
pub fn root_mount_sample(payload: &str, metric: &str) -> Result<Option<f64>, ParseError> {
    let line = payload.lines().find(|line| {
        !line.trim_start().starts_with('#')
            && line.contains(metric)
            && line.contains(ROOT_MOUNT_LABEL)
    });

    let Some(line) = line else {
        return Ok(None);
    };

    let token = line.split_whitespace().last().unwrap_or_default();
    token
        .parse::<f64>()
        .map(Some)
        .map_err(|_| ParseError::NonNumeric {
            metric: metric.to_string(),
            token: token.to_string(),
        })
}

/// Root filesystem figures extracted from one exporter payload
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RootFilesystem {
    pub size_bytes: Option<f64>,
    pub avail_bytes: Option<f64>,
}

impl RootFilesystem {
    pub fn parse(payload: &str) -> Result<Self, ParseError> {
        Ok(RootFilesystem {
            size_bytes: root_mount_sample(payload, FILESYSTEM_SIZE)?,
            avail_bytes: root_mount_sample(payload, FILESYSTEM_AVAIL)?,
        })
    }

    pub fn used_bytes(&self) -> Option<f64> {
        derive_used(self.size_bytes, self.avail_bytes)
    }

    pub fn percent_used(&self) -> Option<Percent> {
        percentage_used(self.used_bytes(), self.size_bytes)
    }
}
