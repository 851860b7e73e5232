use std::collections::HashMap;
use std::fmt::Write;

use crate::host::HostMetricsSnapshot;
use crate::stats::Metric;

/// Prometheus text exposition (version 0.0.4) of the latest plan snapshot
/// plus a fresh host snapshot. Samplers are emitted in lexicographic order
/// with quoted label values.
#[must_use]
pub fn render_metrics(
    running: bool,
    snapshot: &HashMap<String, Metric>,
    host: &HostMetricsSnapshot,
) -> String {
    let mut out = String::with_capacity(4096);

    push_header(
        &mut out,
        "perfolizer_test_running",
        "Test running state (1=running, 0=idle).",
        "gauge",
    );
    let _ = writeln!(out, "perfolizer_test_running {}", i32::from(running));

    push_header(
        &mut out,
        "perfolizer_rps",
        "Requests per second per sampler in the latest stats window.",
        "gauge",
    );
    push_header(
        &mut out,
        "perfolizer_avg_response_time_ms",
        "Average response time in milliseconds in the latest stats window.",
        "gauge",
    );
    push_header(
        &mut out,
        "perfolizer_errors",
        "Errors in the latest stats window.",
        "gauge",
    );
    push_header(
        &mut out,
        "perfolizer_requests_total",
        "Total request count since test start.",
        "counter",
    );
    push_header(
        &mut out,
        "perfolizer_errors_total",
        "Total error count since test start.",
        "counter",
    );

    let mut samplers: Vec<&String> = snapshot.keys().collect();
    samplers.sort();

    for sampler in samplers {
        let metric = snapshot.get(sampler).copied().unwrap_or_default();
        let label = format!("{sampler:?}");

        let _ = writeln!(out, "perfolizer_rps{{sampler={label}}} {:.6}", metric.rps);
        let _ = writeln!(
            out,
            "perfolizer_avg_response_time_ms{{sampler={label}}} {:.6}",
            metric.avg_latency_ms
        );
        let _ = writeln!(
            out,
            "perfolizer_errors{{sampler={label}}} {}",
            metric.errors
        );
        let _ = writeln!(
            out,
            "perfolizer_requests_total{{sampler={label}}} {}",
            metric.total_requests
        );
        let _ = writeln!(
            out,
            "perfolizer_errors_total{{sampler={label}}} {}",
            metric.total_errors
        );
    }

    append_host_metrics(&mut out, host);

    out
}

fn append_host_metrics(out: &mut String, host: &HostMetricsSnapshot) {
    push_header(
        out,
        "perfolizer_host_cpu_idle_percent",
        "Host CPU idle time percent.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_cpu_user_percent",
        "Host CPU user time percent.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_cpu_system_percent",
        "Host CPU system time percent.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_cpu_utilization_percent",
        "Host CPU utilization percent.",
        "gauge",
    );
    if host.cpu_available {
        let _ = writeln!(
            out,
            "perfolizer_host_cpu_idle_percent {:.6}",
            host.cpu_idle_percent
        );
        let _ = writeln!(
            out,
            "perfolizer_host_cpu_user_percent {:.6}",
            host.cpu_user_percent
        );
        let _ = writeln!(
            out,
            "perfolizer_host_cpu_system_percent {:.6}",
            host.cpu_system_percent
        );
        let _ = writeln!(
            out,
            "perfolizer_host_cpu_utilization_percent {:.6}",
            host.cpu_utilization_percent
        );
    }

    push_header(
        out,
        "perfolizer_host_context_switches_total",
        "Host context switches total (if supported).",
        "counter",
    );
    if host.has_context_switches {
        let _ = writeln!(
            out,
            "perfolizer_host_context_switches_total {}",
            host.context_switches_total
        );
    }

    push_header(
        out,
        "perfolizer_host_cpu_throttled_total",
        "CPU throttled periods total from cgroup stats (if available).",
        "counter",
    );
    if host.has_throttled_total {
        let _ = writeln!(
            out,
            "perfolizer_host_cpu_throttled_total {}",
            host.throttled_total
        );
    }

    push_header(
        out,
        "perfolizer_host_cpu_throttled_seconds_total",
        "CPU throttled time total in seconds (if available).",
        "counter",
    );
    if host.has_throttled_seconds {
        let _ = writeln!(
            out,
            "perfolizer_host_cpu_throttled_seconds_total {:.6}",
            host.throttled_seconds
        );
    }

    push_header(
        out,
        "perfolizer_host_memory_total_bytes",
        "Host memory total bytes.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_memory_used_bytes",
        "Host memory used bytes.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_memory_free_bytes",
        "Host memory free bytes.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_memory_available_bytes",
        "Host memory available bytes.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_memory_cached_bytes",
        "Host memory cached bytes.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_memory_buffers_bytes",
        "Host memory buffers bytes.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_memory_used_percent",
        "Host memory utilization percent.",
        "gauge",
    );
    if host.memory_available {
        let _ = writeln!(
            out,
            "perfolizer_host_memory_total_bytes {}",
            host.memory_total_bytes
        );
        let _ = writeln!(
            out,
            "perfolizer_host_memory_used_bytes {}",
            host.memory_used_bytes
        );
        let _ = writeln!(
            out,
            "perfolizer_host_memory_free_bytes {}",
            host.memory_free_bytes
        );
        let _ = writeln!(
            out,
            "perfolizer_host_memory_available_bytes {}",
            host.memory_available_bytes
        );
        let _ = writeln!(
            out,
            "perfolizer_host_memory_cached_bytes {}",
            host.memory_cached_bytes
        );
        let _ = writeln!(
            out,
            "perfolizer_host_memory_buffers_bytes {}",
            host.memory_buffers_bytes
        );
        let _ = writeln!(
            out,
            "perfolizer_host_memory_used_percent {:.6}",
            host.memory_used_percent
        );
    }

    push_header(
        out,
        "perfolizer_host_swap_total_bytes",
        "Host swap total bytes.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_swap_used_bytes",
        "Host swap used bytes.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_swap_free_bytes",
        "Host swap free bytes.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_swap_used_percent",
        "Host swap used percent.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_swap_in_bytes_total",
        "Host swap in bytes total.",
        "counter",
    );
    push_header(
        out,
        "perfolizer_host_swap_out_bytes_total",
        "Host swap out bytes total.",
        "counter",
    );
    if host.swap_available {
        let _ = writeln!(
            out,
            "perfolizer_host_swap_total_bytes {}",
            host.swap_total_bytes
        );
        let _ = writeln!(
            out,
            "perfolizer_host_swap_used_bytes {}",
            host.swap_used_bytes
        );
        let _ = writeln!(
            out,
            "perfolizer_host_swap_free_bytes {}",
            host.swap_free_bytes
        );
        let _ = writeln!(
            out,
            "perfolizer_host_swap_used_percent {:.6}",
            host.swap_used_percent
        );
        let _ = writeln!(
            out,
            "perfolizer_host_swap_in_bytes_total {}",
            host.swap_in_bytes_total
        );
        let _ = writeln!(
            out,
            "perfolizer_host_swap_out_bytes_total {}",
            host.swap_out_bytes_total
        );
    }

    push_header(
        out,
        "perfolizer_host_memory_page_faults_total",
        "Host memory page faults total (if supported).",
        "counter",
    );
    if host.has_page_faults {
        let _ = writeln!(
            out,
            "perfolizer_host_memory_page_faults_total {}",
            host.page_faults_total
        );
    }

    push_header(
        out,
        "perfolizer_host_memory_major_page_faults_total",
        "Host memory major page faults total (if supported).",
        "counter",
    );
    if host.has_major_page_faults {
        let _ = writeln!(
            out,
            "perfolizer_host_memory_major_page_faults_total {}",
            host.major_page_faults_total
        );
    }

    push_header(
        out,
        "perfolizer_host_memory_page_in_total",
        "Host memory pages paged in total (if supported).",
        "counter",
    );
    if host.has_page_in {
        let _ = writeln!(
            out,
            "perfolizer_host_memory_page_in_total {}",
            host.page_in_total
        );
    }

    push_header(
        out,
        "perfolizer_host_memory_page_out_total",
        "Host memory pages paged out total (if supported).",
        "counter",
    );
    if host.has_page_out {
        let _ = writeln!(
            out,
            "perfolizer_host_memory_page_out_total {}",
            host.page_out_total
        );
    }

    let path_label = format!("{:?}", host.disk_path);
    push_header(
        out,
        "perfolizer_host_disk_total_bytes",
        "Host disk total bytes for selected path.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_disk_used_bytes",
        "Host disk used bytes for selected path.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_disk_free_bytes",
        "Host disk free bytes for selected path.",
        "gauge",
    );
    push_header(
        out,
        "perfolizer_host_disk_used_percent",
        "Host disk utilization percent for selected path.",
        "gauge",
    );
    if host.disk_available {
        let _ = writeln!(
            out,
            "perfolizer_host_disk_total_bytes{{path={path_label}}} {}",
            host.disk_total_bytes
        );
        let _ = writeln!(
            out,
            "perfolizer_host_disk_used_bytes{{path={path_label}}} {}",
            host.disk_used_bytes
        );
        let _ = writeln!(
            out,
            "perfolizer_host_disk_free_bytes{{path={path_label}}} {}",
            host.disk_free_bytes
        );
        let _ = writeln!(
            out,
            "perfolizer_host_disk_used_percent{{path={path_label}}} {:.6}",
            host.disk_used_percent
        );
    }

    push_header(
        out,
        "perfolizer_host_disk_read_bytes_total",
        "Host disk read bytes total across visible devices.",
        "counter",
    );
    push_header(
        out,
        "perfolizer_host_disk_write_bytes_total",
        "Host disk write bytes total across visible devices.",
        "counter",
    );
    push_header(
        out,
        "perfolizer_host_disk_read_ops_total",
        "Host disk read operations total across visible devices.",
        "counter",
    );
    push_header(
        out,
        "perfolizer_host_disk_write_ops_total",
        "Host disk write operations total across visible devices.",
        "counter",
    );
    push_header(
        out,
        "perfolizer_host_disk_io_time_seconds_total",
        "Host disk io busy time total across visible devices.",
        "counter",
    );
    push_header(
        out,
        "perfolizer_host_disk_utilization_percent",
        "Host disk utilization percent derived from io_time deltas.",
        "gauge",
    );
    let _ = writeln!(
        out,
        "perfolizer_host_disk_read_bytes_total {}",
        host.disk_read_bytes_total
    );
    let _ = writeln!(
        out,
        "perfolizer_host_disk_write_bytes_total {}",
        host.disk_write_bytes_total
    );
    let _ = writeln!(
        out,
        "perfolizer_host_disk_read_ops_total {}",
        host.disk_read_ops_total
    );
    let _ = writeln!(
        out,
        "perfolizer_host_disk_write_ops_total {}",
        host.disk_write_ops_total
    );
    if host.has_disk_io_time {
        let _ = writeln!(
            out,
            "perfolizer_host_disk_io_time_seconds_total {:.6}",
            host.disk_io_time_seconds
        );
    }
    if host.has_disk_utilization {
        let _ = writeln!(
            out,
            "perfolizer_host_disk_utilization_percent {:.6}",
            host.disk_utilization_percent
        );
    }
}

fn push_header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}
