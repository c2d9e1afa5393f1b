//! HTTP server endpoint tests

mod common;

use common::*;
use pv_disk_usage_exporter::{
    collector::Collector,
    mounts::{Mount, MountSource},
    server::{serve, SERVER_HEADER},
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serve `collector` on an ephemeral port.
async fn spawn_exporter<M: MountSource>(collector: Collector<M, FixedUsage, FakeResolver>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { serve(listener, collector).await });
    addr
}

fn scenario_collector() -> Collector<StaticMounts, FixedUsage, FakeResolver> {
    let resolver = FakeResolver::default()
        .with_pv(gce_pv(
            PV_NAME,
            Some(("prod", "data")),
            json!({"kubernetes.io/hostname": "node-1"}),
        ))
        .with_pvc(pvc("prod", "data", json!({"app": "db"})));

    let mounts = StaticMounts::new(vec![
        Mount::new("/dev/sdb", pv_mountpoint(PV_NAME), "ext4", "rw"),
        root_mount(),
    ]);

    Collector::new(mounts, FixedUsage::new(), Arc::new(resolver), &collect_config(false))
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let addr = spawn_exporter(scenario_collector()).await;

    let response = reqwest::get(format!("http://{}/metrics", addr)).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; version=0.0.4"
    );
    assert_eq!(response.headers()["server"], SERVER_HEADER);
    assert!(SERVER_HEADER.starts_with("disk-usage-exporter/"));

    let body = response.text().await.unwrap();

    assert!(body.contains("# HELP pv_disk_usage_percent_used Percentage of non-root filesystem used\n"));
    assert!(body.contains("# TYPE pv_disk_usage_percent_used gauge\n"));
    assert!(body.contains("# TYPE pv_disk_usage_exporter_request_seconds gauge\n"));

    // four usage samples for the PV mount, none for the root filesystem
    let usage_lines: Vec<&str> = body
        .lines()
        .filter(|l| l.starts_with("pv_disk_usage_") && !l.starts_with("pv_disk_usage_exporter_"))
        .collect();
    assert_eq!(usage_lines.len(), 4);
    for line in &usage_lines {
        assert!(line.contains(r#"pv_name="pvc-123""#), "{}", line);
        assert!(line.contains(r#"pv_kubernetes_io_hostname="node-1""#), "{}", line);
        assert!(line.contains(r#"volume_label_source="pvc""#), "{}", line);
        assert!(!line.contains("mountpoint="), "{}", line);
    }
    assert!(body.contains(r#"pvc_app="db""#));
    assert!(usage_lines.iter().any(|l| l.starts_with("pv_disk_usage_bytes_total{") && l.ends_with(" 10000")));

    // timing samples of the exporter itself
    assert_eq!(
        body.lines()
            .filter(|l| l.starts_with("pv_disk_usage_exporter_collect_seconds "))
            .count(),
        1
    );
    assert_eq!(
        body.lines()
            .filter(|l| l.starts_with("pv_disk_usage_exporter_request_seconds "))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_request_duration_covers_rendering() {
    let addr = spawn_exporter(scenario_collector()).await;

    let body = reqwest::get(format!("http://{}/metrics", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let value_of = |name: &str| -> f64 {
        body.lines()
            .find_map(|l| l.strip_prefix(name))
            .and_then(|v| v.trim().parse().ok())
            .unwrap()
    };
    let collect = value_of("pv_disk_usage_exporter_collect_seconds ");
    let request = value_of("pv_disk_usage_exporter_request_seconds ");
    assert!(request >= collect, "request {} < collect {}", request, collect);

    // taken last, after everything else was rendered
    assert!(body
        .lines()
        .last()
        .unwrap()
        .starts_with("pv_disk_usage_exporter_request_seconds "));
}

#[tokio::test]
async fn test_metrics_endpoint_with_unresolvable_volume() {
    let mounts = StaticMounts::new(vec![pv_mount("/dev/sdc", "pvc-orphan")]);
    let collector = Collector::new(
        mounts,
        FixedUsage::new(),
        Arc::new(FakeResolver::default()),
        &collect_config(false),
    );
    let addr = spawn_exporter(collector).await;

    let response = reqwest::get(format!("http://{}/metrics", addr)).await.unwrap();
    assert_eq!(response.status(), 200);

    let body = response.text().await.unwrap();
    assert!(body.contains(r#"device="/dev/sdc""#));
    assert!(body.contains(
        r#"mountpoint="/var/lib/kubelet/pods/3cc99367-5c20-11e7-ba69-42010af0012c/volumes/kubernetes.io~gce-pd/pvc-orphan""#
    ));
    assert!(!body.contains("pv_name="));
}

#[tokio::test]
async fn test_metrics_endpoint_fails_when_mounts_unavailable() {
    let collector = Collector::new(
        StaticMounts::failing(),
        FixedUsage::new(),
        Arc::new(FakeResolver::default()),
        &collect_config(false),
    );
    let addr = spawn_exporter(collector).await;

    let response = reqwest::get(format!("http://{}/metrics", addr)).await.unwrap();
    assert_eq!(response.status(), 500);
    let body = response.text().await.unwrap();
    assert!(body.starts_with("Failed to collect metrics"));
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = spawn_exporter(scenario_collector()).await;

    let response = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_root_endpoint_links_metrics() {
    let addr = spawn_exporter(scenario_collector()).await;

    let response = reqwest::get(format!("http://{}/", addr)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().contains(r#"href="/metrics""#));
}
