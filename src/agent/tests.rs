use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AgentError;
use crate::host::HostMetricsSnapshot;
use crate::plan::parse_test_plan;
use crate::stats::{Metric, TOTAL_KEY};

use super::*;

fn idle_snapshot() -> HashMap<String, Metric> {
    let mut snapshot = HashMap::new();
    snapshot.insert(TOTAL_KEY.to_owned(), Metric::default());
    snapshot
}

#[test]
fn render_includes_running_flag_and_total() {
    let rendered = render_metrics(false, &idle_snapshot(), &HostMetricsSnapshot::default());

    assert!(rendered.contains("# HELP perfolizer_test_running"));
    assert!(rendered.contains("# TYPE perfolizer_test_running gauge"));
    assert!(rendered.contains("perfolizer_test_running 0\n"));
    assert!(rendered.contains("perfolizer_rps{sampler=\"Total\"} 0.000000\n"));
    assert!(rendered.contains("perfolizer_requests_total{sampler=\"Total\"} 0\n"));

    let rendered = render_metrics(true, &idle_snapshot(), &HostMetricsSnapshot::default());
    assert!(rendered.contains("perfolizer_test_running 1\n"));
}

#[test]
fn render_orders_samplers_lexicographically() {
    let mut snapshot = idle_snapshot();
    snapshot.insert(
        "beta".to_owned(),
        Metric {
            rps: 2.5,
            avg_latency_ms: 12.0,
            errors: 1,
            total_requests: 10,
            total_errors: 2,
        },
    );
    snapshot.insert("alpha".to_owned(), Metric::default());

    let rendered = render_metrics(true, &snapshot, &HostMetricsSnapshot::default());

    // "Total" sorts before lowercase names.
    let total_at = rendered.find("perfolizer_rps{sampler=\"Total\"}").expect("Total");
    let alpha_at = rendered.find("perfolizer_rps{sampler=\"alpha\"}").expect("alpha");
    let beta_at = rendered.find("perfolizer_rps{sampler=\"beta\"}").expect("beta");
    assert!(total_at < alpha_at && alpha_at < beta_at);

    assert!(rendered.contains("perfolizer_rps{sampler=\"beta\"} 2.500000\n"));
    assert!(rendered.contains("perfolizer_avg_response_time_ms{sampler=\"beta\"} 12.000000\n"));
    assert!(rendered.contains("perfolizer_errors{sampler=\"beta\"} 1\n"));
    assert!(rendered.contains("perfolizer_requests_total{sampler=\"beta\"} 10\n"));
    assert!(rendered.contains("perfolizer_errors_total{sampler=\"beta\"} 2\n"));
}

#[test]
fn render_quotes_sampler_labels() {
    let mut snapshot = idle_snapshot();
    snapshot.insert("with \"quotes\"".to_owned(), Metric::default());

    let rendered = render_metrics(false, &snapshot, &HostMetricsSnapshot::default());
    assert!(rendered.contains("perfolizer_rps{sampler=\"with \\\"quotes\\\"\"}"));
}

#[test]
fn render_gates_host_sections_on_availability() {
    let mut host = HostMetricsSnapshot {
        disk_path: "/".to_owned(),
        ..HostMetricsSnapshot::default()
    };

    let rendered = render_metrics(false, &idle_snapshot(), &host);
    // Headers are always present, values only when available.
    assert!(rendered.contains("# HELP perfolizer_host_cpu_idle_percent"));
    assert!(!rendered.contains("perfolizer_host_cpu_idle_percent 0"));
    assert!(!rendered.contains("perfolizer_host_memory_total_bytes 0\n"));
    // Disk IO counters are emitted unconditionally.
    assert!(rendered.contains("perfolizer_host_disk_read_bytes_total 0\n"));
    assert!(rendered.contains("perfolizer_host_disk_write_ops_total 0\n"));

    host.cpu_available = true;
    host.cpu_idle_percent = 75.0;
    host.cpu_user_percent = 20.0;
    host.cpu_system_percent = 5.0;
    host.cpu_utilization_percent = 25.0;
    host.memory_available = true;
    host.memory_total_bytes = 1024;
    host.disk_available = true;
    host.disk_total_bytes = 2048;
    host.disk_used_percent = 50.0;

    let rendered = render_metrics(false, &idle_snapshot(), &host);
    assert!(rendered.contains("perfolizer_host_cpu_idle_percent 75.000000\n"));
    assert!(rendered.contains("perfolizer_host_cpu_utilization_percent 25.000000\n"));
    assert!(rendered.contains("perfolizer_host_memory_total_bytes 1024\n"));
    assert!(rendered.contains("perfolizer_host_disk_total_bytes{path=\"/\"} 2048\n"));
    assert!(rendered.contains("perfolizer_host_disk_used_percent{path=\"/\"} 50.000000\n"));
}

fn quick_plan(pause_ms: u64) -> Arc<dyn crate::plan::TestElement> {
    let dto = serde_json::json!({
        "type": "TestPlan",
        "name": "unit-plan",
        "children": [{
            "type": "SimpleThreadGroup",
            "name": "g",
            "props": {"Users": 1, "Iterations": 1},
            "children": [{
                "type": "PauseController",
                "name": "p",
                "props": {"DurationMS": pause_ms}
            }]
        }]
    });
    parse_test_plan(&serde_json::to_vec(&dto).expect("encode")).expect("hydrate")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_enforces_single_run() {
    let server = AgentServer::new(ServerOptions::default());

    server.start(quick_plan(300)).expect("first run starts");
    let (running, _) = server.snapshot();
    assert!(running);

    let err = server.start(quick_plan(300)).expect_err("second run conflicts");
    assert!(matches!(err, AgentError::AlreadyRunning));

    tokio::time::sleep(Duration::from_millis(700)).await;
    let (running, _) = server.snapshot();
    assert!(!running);

    server.start(quick_plan(10)).expect("rerun after completion");
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_stop_cancels_and_clears_state() {
    let server = AgentServer::new(ServerOptions::default());
    server.start(quick_plan(10_000)).expect("run starts");

    let (was_running, plan_name) = server.stop();
    assert!(was_running);
    assert_eq!(plan_name, "unit-plan");

    let (was_running, _) = server.stop();
    assert!(!was_running);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let (running, snapshot) = server.snapshot();
    assert!(!running);
    assert!(snapshot.contains_key(TOTAL_KEY));
}

#[test]
fn debug_exchange_serialization_omits_empty_fields() {
    let exchange = DebugHttpExchange {
        request: DebugHttpRequest {
            method: "GET".to_owned(),
            url: "http://example".to_owned(),
            headers: None,
            body: String::new(),
        },
        ..DebugHttpExchange::default()
    };

    let rendered = serde_json::to_string(&exchange).expect("encode");
    assert!(rendered.contains("\"duration_ms\":0"));
    assert!(!rendered.contains("response"));
    assert!(!rendered.contains("error"));
    assert!(!rendered.contains("truncated"));
    assert!(!rendered.contains("\"body\""));
}
