//! End-to-end runs of the scan pipeline against stubbed cluster, exporters
//! and mail relay.

use diskwatch_devkit::{
    root_filesystem_payload, ExpositionBuilder, InventoryCall, Listing, RecordingNotifier,
    StubInventory, StubMetricsSource, TestHarness,
};

#[tokio::test]
async fn test_host_storage_at_threshold_alerts() {
    let inventory = StubInventory::new().storage("n1", "local", Some(80), Some(100));
    let harness = TestHarness::new(inventory, StubMetricsSource::new());

    let run = harness.run().await.unwrap();

    assert_eq!(run.finding_lines(), vec!["HOST n1 storage local: 80%"]);
    assert_eq!(run.summary(), Some("Alert email sent."));
    assert_eq!(run.exit_code(), 0);

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Proxmox Disk Alert: >= 80%");
    assert_eq!(
        sent[0].body,
        "The following storage targets are at or above 80% disk usage:\n\n\
         HOST n1 storage local: 80%\n"
    );
}

#[tokio::test]
async fn test_vm_agent_error_is_not_fatal() {
    // No agent fixture: the stub answers AgentUnavailable
    let inventory = StubInventory::new()
        .storage("n1", "local", Some(10), Some(100))
        .vm("n1", 100, "web01", "running");
    let metrics = StubMetricsSource::new();
    let harness = TestHarness::new(inventory, metrics.clone());

    let run = harness.run().await.unwrap();

    assert!(run.finding_lines().iter().all(|line| !line.starts_with("VM ")));
    assert_eq!(run.report.readings, 1);
    assert!(metrics.fetched().is_empty());
    assert!(harness
        .inventory
        .was_called(&InventoryCall::VmAgent("n1".to_string(), 100)));
    assert_eq!(run.summary(), Some("No disk alerts."));
}

#[tokio::test]
async fn test_container_at_exact_threshold() {
    let inventory = StubInventory::new()
        .container("n1", 200, "ct1", "running")
        .container_addresses("n1", 200, &["10.0.0.9/24"]);
    let metrics =
        StubMetricsSource::new().with_payload("10.0.0.9", root_filesystem_payload(1000, 200));

    let run = TestHarness::new(inventory, metrics).run().await.unwrap();

    assert_eq!(run.finding_lines(), vec!["CT ct1 (10.0.0.9): 80%"]);
}

#[tokio::test]
async fn test_container_just_below_threshold() {
    let inventory = StubInventory::new()
        .container("n1", 200, "ct1", "running")
        .container_addresses("n1", 200, &["10.0.0.9/24"]);
    // 799 / 1000 = 79.9%
    let metrics =
        StubMetricsSource::new().with_payload("10.0.0.9", root_filesystem_payload(1000, 201));

    let harness = TestHarness::new(inventory, metrics);
    let run = harness.run().await.unwrap();

    assert!(run.finding_lines().is_empty());
    assert_eq!(run.report.readings, 1);
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_all_below_threshold_sends_nothing() {
    let inventory = StubInventory::new()
        .storage("n1", "local", Some(10), Some(100))
        .storage("n1", "local-lvm", Some(0), Some(0))
        .vm("n1", 100, "web01", "running")
        .vm_agent_addresses("n1", 100, &["10.0.0.5"]);
    let metrics =
        StubMetricsSource::new().with_payload("10.0.0.5", root_filesystem_payload(1000, 900));

    let harness = TestHarness::new(inventory, metrics);
    let run = harness.run().await.unwrap();

    assert!(!run.report.has_alerts());
    assert_eq!(run.report.unknown, 1);
    assert_eq!(run.summary(), Some("No disk alerts."));
    assert_eq!(run.exit_code(), 0);
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_notifier_failure_keeps_findings() {
    let inventory = StubInventory::new().storage("n1", "local", Some(95), Some(100));
    let harness = TestHarness::new(inventory, StubMetricsSource::new())
        .with_notifier(RecordingNotifier::failing("535 authentication failed"));

    let run = harness.run().await.unwrap();

    assert_ne!(run.exit_code(), 0);
    assert_eq!(run.summary(), None);

    let error = run.delivery.as_ref().unwrap_err();
    assert_eq!(error.findings.len(), 1);
    assert_eq!(error.findings[0].as_str(), "HOST n1 storage local: 95%");
    assert!(error.to_string().contains("535 authentication failed"));
}

#[tokio::test]
async fn test_findings_keep_discovery_order_across_nodes() {
    let inventory = StubInventory::new()
        .storage("n1", "local", Some(90), Some(100))
        .vm("n1", 100, "web01", "running")
        .vm_agent_addresses("n1", 100, &["10.0.0.5", "10.0.1.5"])
        .container("n1", 200, "ct1", "running")
        .container_addresses("n1", 200, &["10.0.0.9/24"])
        .storage("n2", "ceph", Some(85), Some(100));
    let full = root_filesystem_payload(100, 5);
    let metrics = StubMetricsSource::new()
        .with_payload("10.0.0.5", full.clone())
        .with_payload("10.0.1.5", full.clone())
        .with_payload("10.0.0.9", full);

    let run = TestHarness::new(inventory, metrics.clone()).run().await.unwrap();

    assert_eq!(
        run.finding_lines(),
        vec![
            "HOST n1 storage local: 90%",
            "VM web01 (10.0.0.5): 95%",
            "VM web01 (10.0.1.5): 95%",
            "CT ct1 (10.0.0.9): 95%",
            "HOST n2 storage ceph: 85%",
        ]
    );
    assert_eq!(metrics.fetched(), vec!["10.0.0.5", "10.0.1.5", "10.0.0.9"]);
    assert_eq!(run.report.nodes, 2);
}

#[tokio::test]
async fn test_stopped_vm_skipped_but_stopped_container_scraped() {
    let inventory = StubInventory::new()
        .vm("n1", 100, "old-vm", "stopped")
        .vm_agent_addresses("n1", 100, &["10.0.0.5"])
        .container("n1", 200, "ct1", "stopped")
        .container_addresses("n1", 200, &["10.0.0.9/24"]);
    let metrics = StubMetricsSource::new()
        .with_payload("10.0.0.5", root_filesystem_payload(100, 1))
        .with_payload("10.0.0.9", root_filesystem_payload(100, 1));

    let harness = TestHarness::new(inventory, metrics.clone());
    let run = harness.run().await.unwrap();

    assert_eq!(run.finding_lines(), vec!["CT ct1 (10.0.0.9): 99%"]);
    assert!(!harness
        .inventory
        .was_called(&InventoryCall::VmAgent("n1".to_string(), 100)));
    assert_eq!(metrics.fetched(), vec!["10.0.0.9"]);
}

#[tokio::test]
async fn test_loopback_and_ipv6_addresses_never_scraped() {
    let inventory = StubInventory::new()
        .vm("n1", 100, "web01", "running")
        .vm_agent_addresses("n1", 100, &["127.0.0.1", "fe80::1", "10.0.0.5"]);
    let metrics =
        StubMetricsSource::new().with_payload("10.0.0.5", root_filesystem_payload(1000, 100));

    let run = TestHarness::new(inventory, metrics.clone()).run().await.unwrap();

    assert_eq!(metrics.fetched(), vec!["10.0.0.5"]);
    assert_eq!(run.finding_lines(), vec!["VM web01 (10.0.0.5): 90%"]);
}

#[tokio::test]
async fn test_listing_failure_drops_only_that_section() {
    let inventory = StubInventory::new()
        .storage("n1", "local", Some(99), Some(100))
        .failing_listing("n1", Listing::Vms)
        .container("n1", 200, "ct1", "running")
        .container_addresses("n1", 200, &["10.0.0.9/24"]);
    let metrics =
        StubMetricsSource::new().with_payload("10.0.0.9", root_filesystem_payload(1000, 100));

    let run = TestHarness::new(inventory, metrics).run().await.unwrap();

    assert_eq!(
        run.finding_lines(),
        vec!["HOST n1 storage local: 99%", "CT ct1 (10.0.0.9): 90%"]
    );
}

#[tokio::test]
async fn test_node_listing_failure_aborts_run() {
    let harness = TestHarness::new(StubInventory::new().failing_nodes(), StubMetricsSource::new());

    assert!(harness.run().await.is_err());
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_bare_agent_response() {
    let inventory = StubInventory::new()
        .vm("n1", 100, "web01", "running")
        .vm_agent(
            "n1",
            100,
            serde_json::json!([
                {"name": "lo", "ip-addresses": [{"ip-address": "127.0.0.1", "ip-address-type": "ipv4", "prefix": 8}]},
                {"name": "ens18", "ip-addresses": [{"ip-address": "192.168.1.20", "ip-address-type": "ipv4", "prefix": 24}]}
            ]),
        );
    let metrics =
        StubMetricsSource::new().with_payload("192.168.1.20", root_filesystem_payload(200, 20));

    let run = TestHarness::new(inventory, metrics).run().await.unwrap();

    assert_eq!(run.finding_lines(), vec!["VM web01 (192.168.1.20): 90%"]);
}

#[tokio::test]
async fn test_unreadable_payload_is_unknown() {
    let inventory = StubInventory::new()
        .container("n1", 200, "ct1", "running")
        .container_addresses("n1", 200, &["10.0.0.9/24"]);
    let payload = ExpositionBuilder::new()
        .raw_line("node_filesystem_size_bytes{mountpoint=\"/\"} NaN-ish")
        .build();
    let metrics = StubMetricsSource::new().with_payload("10.0.0.9", payload);

    let run = TestHarness::new(inventory, metrics).run().await.unwrap();

    assert_eq!(run.report.readings, 1);
    assert_eq!(run.report.unknown, 1);
    assert!(run.finding_lines().is_empty());
}

#[tokio::test]
async fn test_unreachable_exporter_skips_candidate() {
    let inventory = StubInventory::new()
        .container("n1", 200, "ct1", "running")
        .container_addresses("n1", 200, &["10.0.0.9/24"]);

    let run = TestHarness::new(inventory, StubMetricsSource::new())
        .run()
        .await
        .unwrap();

    assert_eq!(run.report.candidates, 1);
    assert_eq!(run.report.skipped, 1);
    assert_eq!(run.report.readings, 0);
}
