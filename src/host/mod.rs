//! Host metrics: CPU, memory, swap, disk usage, and disk IO sampling with
//! delta-based utilization, behind a per-platform raw backend.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
use linux::Backend;

#[cfg(not(target_os = "linux"))]
mod portable;
#[cfg(not(target_os = "linux"))]
use portable::Backend;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sysinfo::Disks;
use tokio::time::Instant;

/// Point-in-time view of host resources, with availability flags per
/// section so absent platform data renders as absent rather than zero.
#[derive(Debug, Clone, Default)]
pub struct HostMetricsSnapshot {
    pub cpu_available: bool,
    pub cpu_idle_percent: f64,
    pub cpu_user_percent: f64,
    pub cpu_system_percent: f64,
    pub cpu_utilization_percent: f64,

    pub has_context_switches: bool,
    pub context_switches_total: u64,
    pub has_throttled_total: bool,
    pub throttled_total: u64,
    pub has_throttled_seconds: bool,
    pub throttled_seconds: f64,

    pub memory_available: bool,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub memory_free_bytes: u64,
    pub memory_available_bytes: u64,
    pub memory_cached_bytes: u64,
    pub memory_buffers_bytes: u64,
    pub memory_used_percent: f64,

    pub swap_available: bool,
    pub swap_total_bytes: u64,
    pub swap_used_bytes: u64,
    pub swap_free_bytes: u64,
    pub swap_used_percent: f64,
    pub swap_in_bytes_total: u64,
    pub swap_out_bytes_total: u64,

    pub has_page_faults: bool,
    pub page_faults_total: u64,
    pub has_major_page_faults: bool,
    pub major_page_faults_total: u64,
    pub has_page_in: bool,
    pub page_in_total: u64,
    pub has_page_out: bool,
    pub page_out_total: u64,

    pub disk_available: bool,
    pub disk_path: String,
    pub disk_total_bytes: u64,
    pub disk_used_bytes: u64,
    pub disk_free_bytes: u64,
    pub disk_used_percent: f64,
    pub disk_read_bytes_total: u64,
    pub disk_write_bytes_total: u64,
    pub disk_read_ops_total: u64,
    pub disk_write_ops_total: u64,
    pub has_disk_io_time: bool,
    pub disk_io_time_seconds: f64,
    pub has_disk_utilization: bool,
    pub disk_utilization_percent: f64,
}

/// Raw platform readout before delta arithmetic.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawHostSnapshot {
    pub cpu_usage_available: bool,
    pub cpu_idle_percent: f64,
    pub cpu_user_percent: f64,
    pub cpu_system_percent: f64,

    pub cpu_times_available: bool,
    pub cpu_user_total: f64,
    pub cpu_system_total: f64,
    pub cpu_idle_total: f64,
    pub cpu_total: f64,

    pub has_context_switches: bool,
    pub context_switches_total: u64,
    pub has_throttled_total: bool,
    pub throttled_total: u64,
    pub has_throttled_seconds: bool,
    pub throttled_seconds: f64,

    pub memory_available: bool,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub memory_free_bytes: u64,
    pub memory_available_bytes: u64,
    pub memory_cached_bytes: u64,
    pub memory_buffers_bytes: u64,
    pub memory_used_percent: f64,

    pub swap_available: bool,
    pub swap_total_bytes: u64,
    pub swap_used_bytes: u64,
    pub swap_free_bytes: u64,
    pub swap_used_percent: f64,
    pub swap_in_bytes_total: u64,
    pub swap_out_bytes_total: u64,

    pub has_page_faults: bool,
    pub page_faults_total: u64,
    pub has_major_page_faults: bool,
    pub major_page_faults_total: u64,
    pub has_page_in: bool,
    pub page_in_total: u64,
    pub has_page_out: bool,
    pub page_out_total: u64,

    pub disk_available: bool,
    pub disk_total_bytes: u64,
    pub disk_used_bytes: u64,
    pub disk_free_bytes: u64,
    pub disk_used_percent: f64,
    pub has_disk_io_counters: bool,
    pub disk_read_bytes_total: u64,
    pub disk_write_bytes_total: u64,
    pub disk_read_ops_total: u64,
    pub disk_write_ops_total: u64,
    pub has_disk_io_time: bool,
    pub disk_io_time_seconds: f64,
}

/// Stateful collector. Holds previous CPU totals and disk IO-busy time so
/// utilization percentages can be derived from deltas; the first collect
/// after start only primes that state.
pub struct HostMetricsCollector {
    inner: Mutex<CollectorInner>,
}

struct CollectorInner {
    disk_path: PathBuf,
    backend: Backend,
    prev_cpu: Option<CpuTotals>,
    prev_disk_io_time_seconds: f64,
    prev_disk_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy)]
struct CpuTotals {
    user: f64,
    system: f64,
    idle: f64,
    total: f64,
}

impl Default for HostMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CollectorInner {
                disk_path: default_disk_path(),
                backend: Backend::new(),
                prev_cpu: None,
                prev_disk_io_time_seconds: 0.0,
                prev_disk_at: None,
            }),
        }
    }

    pub fn collect(&self) -> HostMetricsSnapshot {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };

        let disk_path = inner.disk_path.clone();
        let raw = inner.backend.collect_raw(&disk_path);
        let now = Instant::now();

        let mut snapshot = HostMetricsSnapshot {
            disk_path: disk_path.display().to_string(),
            ..HostMetricsSnapshot::default()
        };

        inner.apply_cpu(&mut snapshot, &raw);
        apply_memory(&mut snapshot, &raw);
        inner.apply_disk(&mut snapshot, &raw, now);

        snapshot.has_context_switches = raw.has_context_switches;
        snapshot.context_switches_total = raw.context_switches_total;
        snapshot.has_throttled_total = raw.has_throttled_total;
        snapshot.throttled_total = raw.throttled_total;
        snapshot.has_throttled_seconds = raw.has_throttled_seconds;
        snapshot.throttled_seconds = raw.throttled_seconds;

        snapshot
    }
}

impl CollectorInner {
    fn apply_cpu(&mut self, snapshot: &mut HostMetricsSnapshot, raw: &RawHostSnapshot) {
        if raw.cpu_usage_available {
            snapshot.cpu_available = true;
            snapshot.cpu_idle_percent = clamp_percent(raw.cpu_idle_percent);
            snapshot.cpu_user_percent = clamp_percent(raw.cpu_user_percent);
            snapshot.cpu_system_percent = clamp_percent(raw.cpu_system_percent);
            snapshot.cpu_utilization_percent = clamp_percent(100.0 - snapshot.cpu_idle_percent);
            return;
        }

        if !raw.cpu_times_available {
            return;
        }

        if let Some(prev) = self.prev_cpu {
            let delta_total = raw.cpu_total - prev.total;
            if delta_total > 0.0 {
                let user_delta = clamp_non_negative(raw.cpu_user_total - prev.user);
                let system_delta = clamp_non_negative(raw.cpu_system_total - prev.system);
                let idle_delta = clamp_non_negative(raw.cpu_idle_total - prev.idle);

                snapshot.cpu_available = true;
                snapshot.cpu_user_percent = clamp_percent(user_delta / delta_total * 100.0);
                snapshot.cpu_system_percent = clamp_percent(system_delta / delta_total * 100.0);
                snapshot.cpu_idle_percent = clamp_percent(idle_delta / delta_total * 100.0);
                snapshot.cpu_utilization_percent =
                    clamp_percent(100.0 - snapshot.cpu_idle_percent);
            }
        }

        self.prev_cpu = Some(CpuTotals {
            user: raw.cpu_user_total,
            system: raw.cpu_system_total,
            idle: raw.cpu_idle_total,
            total: raw.cpu_total,
        });
    }

    fn apply_disk(&mut self, snapshot: &mut HostMetricsSnapshot, raw: &RawHostSnapshot, now: Instant) {
        snapshot.disk_available = raw.disk_available;
        snapshot.disk_total_bytes = raw.disk_total_bytes;
        snapshot.disk_used_bytes = raw.disk_used_bytes;
        snapshot.disk_free_bytes = raw.disk_free_bytes;
        snapshot.disk_used_percent = raw.disk_used_percent;

        if raw.has_disk_io_counters {
            snapshot.disk_read_bytes_total = raw.disk_read_bytes_total;
            snapshot.disk_write_bytes_total = raw.disk_write_bytes_total;
            snapshot.disk_read_ops_total = raw.disk_read_ops_total;
            snapshot.disk_write_ops_total = raw.disk_write_ops_total;
        }

        if !raw.has_disk_io_time {
            return;
        }

        snapshot.has_disk_io_time = true;
        snapshot.disk_io_time_seconds = raw.disk_io_time_seconds;

        if let Some(prev_at) = self.prev_disk_at {
            if now > prev_at && raw.disk_io_time_seconds >= self.prev_disk_io_time_seconds {
                let elapsed = now.duration_since(prev_at).as_secs_f64();
                if elapsed > 0.0 {
                    let delta_busy = raw.disk_io_time_seconds - self.prev_disk_io_time_seconds;
                    snapshot.has_disk_utilization = true;
                    snapshot.disk_utilization_percent =
                        clamp_percent(delta_busy / elapsed * 100.0);
                }
            }
        }

        self.prev_disk_io_time_seconds = raw.disk_io_time_seconds;
        self.prev_disk_at = Some(now);
    }
}

fn apply_memory(snapshot: &mut HostMetricsSnapshot, raw: &RawHostSnapshot) {
    snapshot.memory_available = raw.memory_available;
    snapshot.memory_total_bytes = raw.memory_total_bytes;
    snapshot.memory_used_bytes = raw.memory_used_bytes;
    snapshot.memory_free_bytes = raw.memory_free_bytes;
    snapshot.memory_available_bytes = raw.memory_available_bytes;
    snapshot.memory_cached_bytes = raw.memory_cached_bytes;
    snapshot.memory_buffers_bytes = raw.memory_buffers_bytes;
    snapshot.memory_used_percent = raw.memory_used_percent;

    snapshot.swap_available = raw.swap_available;
    snapshot.swap_total_bytes = raw.swap_total_bytes;
    snapshot.swap_used_bytes = raw.swap_used_bytes;
    snapshot.swap_free_bytes = raw.swap_free_bytes;
    snapshot.swap_used_percent = raw.swap_used_percent;
    snapshot.swap_in_bytes_total = raw.swap_in_bytes_total;
    snapshot.swap_out_bytes_total = raw.swap_out_bytes_total;

    snapshot.has_page_faults = raw.has_page_faults;
    snapshot.page_faults_total = raw.page_faults_total;
    snapshot.has_major_page_faults = raw.has_major_page_faults;
    snapshot.major_page_faults_total = raw.major_page_faults_total;
    snapshot.has_page_in = raw.has_page_in;
    snapshot.page_in_total = raw.page_in_total;
    snapshot.has_page_out = raw.has_page_out;
    snapshot.page_out_total = raw.page_out_total;
}

/// Disk usage for the mount holding `path`, resolved against the longest
/// matching mount point.
pub(crate) fn disk_usage_for_path(disks: &Disks, path: &Path, raw: &mut RawHostSnapshot) {
    let mut best: Option<(usize, u64, u64)> = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if path.starts_with(mount) {
            let depth = mount.components().count();
            if best.map_or(true, |(best_depth, _, _)| depth >= best_depth) {
                best = Some((depth, disk.total_space(), disk.available_space()));
            }
        }
    }

    let Some((_, total, free)) = best else {
        return;
    };
    if total == 0 {
        return;
    }

    let used = total.saturating_sub(free);
    raw.disk_available = true;
    raw.disk_total_bytes = total;
    raw.disk_free_bytes = free;
    raw.disk_used_bytes = used;
    raw.disk_used_percent = used as f64 / total as f64 * 100.0;
}

fn default_disk_path() -> PathBuf {
    #[cfg(windows)]
    {
        if let Ok(cwd) = std::env::current_dir() {
            if let Some(std::path::Component::Prefix(prefix)) = cwd.components().next() {
                let mut volume = prefix.as_os_str().to_os_string();
                volume.push("\\");
                return PathBuf::from(volume);
            }
        }
        PathBuf::from("C:\\")
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/")
    }
}

pub(crate) fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

fn clamp_non_negative(value: f64) -> f64 {
    if value < 0.0 {
        0.0
    } else {
        value
    }
}
