//! Threshold filter turning usage readings into alert findings

use crate::scraper::UsageReading;
use serde::Serialize;
use std::fmt;

/// Default alert threshold, in percent (inclusive)
pub const DEFAULT_THRESHOLD: f64 = 80.0;

/// One over-threshold line, e.g. `VM web01 (10.0.0.5): 91%`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding(String);

impl Finding {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Finding for `reading` if its percent is known and at or above `threshold`
pub fn finding_for(reading: &UsageReading, threshold: f64) -> Option<Finding> {
    let percent = reading.percent?;
    if percent.value() < threshold {
        return None;
    }

    Some(Finding(format!(
        "{} {}: {}",
        reading.kind.tag(),
        reading.subject,
        percent
    )))
}

/// Pure form of the aggregator over a finished set of readings
pub fn collect_findings<'r>(
    readings: impl IntoIterator<Item = &'r UsageReading>,
    threshold: f64,
) -> Vec<Finding> {
    readings
        .into_iter()
        .filter_map(|reading| finding_for(reading, threshold))
        .collect()
}

/// Accumulates findings in the order readings arrive
#[derive(Debug, Clone)]
pub struct AlertAggregator {
    threshold: f64,
    findings: Vec<Finding>,
}

impl Default for AlertAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl AlertAggregator {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            findings: Vec::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Returns true when the reading produced a finding
    pub fn record(&mut self, reading: &UsageReading) -> bool {
        match finding_for(reading, self.threshold) {
            Some(finding) => {
                self.findings.push(finding);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}
