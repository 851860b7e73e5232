use super::*;

#[test]
fn clamp_percent_bounds_values() {
    assert!(clamp_percent(-5.0).abs() < f64::EPSILON);
    assert!((clamp_percent(50.0) - 50.0).abs() < f64::EPSILON);
    assert!((clamp_percent(150.0) - 100.0).abs() < f64::EPSILON);
}

#[test]
fn collector_produces_bounded_percentages() {
    let collector = HostMetricsCollector::new();

    // First call primes delta state; the second can derive utilization.
    let _ = collector.collect();
    std::thread::sleep(std::time::Duration::from_millis(50));
    let snapshot = collector.collect();

    assert!(!snapshot.disk_path.is_empty());
    for percent in [
        snapshot.cpu_idle_percent,
        snapshot.cpu_user_percent,
        snapshot.cpu_system_percent,
        snapshot.cpu_utilization_percent,
        snapshot.memory_used_percent,
        snapshot.swap_used_percent,
        snapshot.disk_used_percent,
        snapshot.disk_utilization_percent,
    ] {
        assert!((0.0..=100.0).contains(&percent), "percent was {percent}");
    }
}

#[test]
fn memory_section_is_consistent_when_available() {
    let collector = HostMetricsCollector::new();
    let snapshot = collector.collect();

    if snapshot.memory_available {
        assert!(snapshot.memory_total_bytes > 0);
        assert!(snapshot.memory_used_bytes <= snapshot.memory_total_bytes);
    }
    if snapshot.disk_available {
        assert!(snapshot.disk_total_bytes > 0);
        assert!(snapshot.disk_used_bytes <= snapshot.disk_total_bytes);
    }
}

#[test]
fn delta_state_survives_between_collects() {
    let collector = HostMetricsCollector::new();
    let first = collector.collect();
    let second = collector.collect();

    // Cumulative counters never move backwards between samples.
    if first.has_disk_io_time && second.has_disk_io_time {
        assert!(second.disk_io_time_seconds >= first.disk_io_time_seconds);
    }
    if first.has_context_switches && second.has_context_switches {
        assert!(second.context_switches_total >= first.context_switches_total);
    }
}
