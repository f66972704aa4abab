/*!
Test harness for the scan pipeline

Wires a stub inventory, a stub metrics source and a recording notifier into
`scan` + `deliver`, the same sequence the agent binary runs.
*/

use crate::exposition::StubMetricsSource;
use crate::inventory_stub::StubInventory;
use async_trait::async_trait;
use diskwatch_core::notifier::{AlertMessage, Notifier, NotifyError, DEFAULT_SERVICE_NAME};
use diskwatch_core::{
    deliver, scan, DeliveryError, DiskUsageScraper, InventoryError, RunOutcome, RunReport,
    DEFAULT_THRESHOLD,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Mail as handed to the notifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentAlert {
    pub subject: String,
    pub body: String,
}

/// Notifier that records what it was asked to send
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentAlert>>>,
    failure: Option<String>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send attempt is recorded, then rejected with `reason`
    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentAlert> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent.lock().push(SentAlert {
            subject: subject.to_string(),
            body: body.to_string(),
        });

        match &self.failure {
            Some(reason) => Err(NotifyError::Transport(reason.clone())),
            None => Ok(()),
        }
    }
}

pub struct TestHarness {
    pub inventory: StubInventory,
    pub metrics: StubMetricsSource,
    pub notifier: RecordingNotifier,
    pub threshold: f64,
}

impl TestHarness {
    pub fn new(inventory: StubInventory, metrics: StubMetricsSource) -> Self {
        tracing_subscriber::fmt().with_test_writer().try_init().ok();

        Self {
            inventory,
            metrics,
            notifier: RecordingNotifier::new(),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_notifier(mut self, notifier: RecordingNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// One full run; `Err` only when the node listing fails
    pub async fn run(&self) -> Result<HarnessRun, InventoryError> {
        let scraper = DiskUsageScraper::new(self.metrics.clone());
        let report = scan(&self.inventory, &scraper, self.threshold).await?;

        let message = AlertMessage::new(DEFAULT_SERVICE_NAME, self.threshold);
        let delivery = deliver(&self.notifier, &message, &report).await;

        Ok(HarnessRun { report, delivery })
    }
}

#[derive(Debug)]
pub struct HarnessRun {
    pub report: RunReport,
    pub delivery: Result<RunOutcome, DeliveryError>,
}

impl HarnessRun {
    pub fn finding_lines(&self) -> Vec<String> {
        self.report
            .findings
            .iter()
            .map(|finding| finding.as_str().to_string())
            .collect()
    }

    /// Line the binary would print, if it gets that far
    pub fn summary(&self) -> Option<&'static str> {
        self.delivery.as_ref().ok().map(|outcome| outcome.summary())
    }

    /// Process exit status the binary would report.
    ///
    /// `pve-diskwatch`'s `main` propagates a `DeliveryError` with `?` out of
    /// an `anyhow::Result<()>` return, which the runtime turns into status 1.
    /// Keep both in step if `main` ever maps errors to other codes.
    pub fn exit_code(&self) -> i32 {
        if self.delivery.is_ok() {
            0
        } else {
            1
        }
    }
}
