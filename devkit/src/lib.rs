/*!
# Diskwatch DevKit - Stubs and utilities for testing the scan pipeline

Lets the whole pipeline run without a cluster, exporters or a mail relay:
- Stub cluster inventory with call recording
- Stub metrics source fed with exporter payloads
- Exposition payload builder
- Recording notifier and a test harness tying everything together
*/

pub mod exposition;
pub mod inventory_stub;
pub mod test_utils;

pub use exposition::{root_filesystem_payload, ExpositionBuilder, StubMetricsSource};
pub use inventory_stub::{InventoryCall, Listing, StubInventory};
pub use test_utils::{HarnessRun, RecordingNotifier, SentAlert, TestHarness};
