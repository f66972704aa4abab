//! Alert notification interface
//!
//! The core only composes the message; delivery belongs to an
//! implementation of [`Notifier`] (SMTP in the agent binary).

use crate::alerts::Finding;
use async_trait::async_trait;

/// Service name used in the subject line
pub const DEFAULT_SERVICE_NAME: &str = "Proxmox";

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid address {address}: {reason}")]
    Address { address: String, reason: String },
    #[error("Failed to build message: {0}")]
    Message(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Delivers one composed alert
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Subject and body layout of the alert mail
#[derive(Debug, Clone)]
pub struct AlertMessage {
    service: String,
    threshold: f64,
}

impl AlertMessage {
    pub fn new(service: impl Into<String>, threshold: f64) -> Self {
        Self {
            service: service.into(),
            threshold,
        }
    }

    /// `Proxmox Disk Alert: >= 80%`
    pub fn subject(&self) -> String {
        format!("{} Disk Alert: >= {}%", self.service, self.threshold)
    }

    /// Fixed preamble, then one finding per line
    pub fn body(&self, findings: &[Finding]) -> String {
        let lines: Vec<&str> = findings.iter().map(Finding::as_str).collect();
        format!(
            "The following storage targets are at or above {}% disk usage:\n\n{}\n",
            self.threshold,
            lines.join("\n")
        )
    }
}
