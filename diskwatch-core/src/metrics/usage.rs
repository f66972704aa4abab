//! Used/total arithmetic with an explicit "unknown" outcome

use std::fmt;

/// Disk usage percentage, unclamped and unrounded
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percent(f64);

impl Percent {
    pub fn new(value: f64) -> Self {
        Percent(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Whole percent, rounded down (79.99 stays 79)
    pub fn floored(self) -> u64 {
        self.0.floor() as u64
    }
}

/// Formats with floor semantics: `79%`
impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.floored())
    }
}

/// `(used / total) * 100`, or `None` when total is missing or not positive
pub fn percentage_used(used: Option<f64>, total: Option<f64>) -> Option<Percent> {
    let (used, total) = (used?, total?);
    if total <= 0.0 {
        return None;
    }

    let percent = (used / total) * 100.0;
    percent.is_finite().then_some(Percent(percent))
}

/// `size - avail`, unknown if either side is unknown
pub fn derive_used(size: Option<f64>, avail: Option<f64>) -> Option<f64> {
    Some(size? - avail?)
}
