use std::collections::HashMap;
use std::path::Path;

use sysinfo::Disks;

use super::{disk_usage_for_path, RawHostSnapshot};

/// Linux backend: `/proc` and cgroup counters for everything `sysinfo` does
/// not expose (per-mode CPU times, vmstat, diskstats, throttling), plus
/// `sysinfo` for disk usage of the selected path.
pub(super) struct Backend {
    disks: Disks,
}

impl Backend {
    pub(super) fn new() -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
        }
    }

    pub(super) fn collect_raw(&mut self, disk_path: &Path) -> RawHostSnapshot {
        let mut raw = RawHostSnapshot::default();

        parse_proc_stat(&mut raw);
        parse_memory(&mut raw);
        parse_disk_io_counters(&mut raw);
        parse_throttling(&mut raw);

        self.disks.refresh();
        disk_usage_for_path(&self.disks, disk_path, &mut raw);

        raw
    }
}

fn parse_proc_stat(raw: &mut RawHostSnapshot) {
    let Ok(content) = std::fs::read_to_string("/proc/stat") else {
        return;
    };

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("cpu ") {
            let fields: Vec<f64> = rest
                .split_whitespace()
                .map(|field| field.parse().unwrap_or(0.0))
                .collect();
            if fields.len() < 7 {
                continue;
            }

            let user = fields[0];
            let nice = fields[1];
            let system = fields[2];
            let idle = fields[3];
            let iowait = fields[4];
            let irq = fields[5];
            let softirq = fields[6];

            raw.cpu_times_available = true;
            raw.cpu_user_total = user + nice;
            raw.cpu_system_total = system + irq + softirq;
            raw.cpu_idle_total = idle + iowait;
            raw.cpu_total = fields.iter().sum();
            continue;
        }

        if let Some(rest) = line.strip_prefix("ctxt ") {
            if let Ok(value) = rest.trim().parse::<u64>() {
                raw.has_context_switches = true;
                raw.context_switches_total = value;
            }
        }
    }
}

fn parse_memory(raw: &mut RawHostSnapshot) {
    if let Some(mem_info) = parse_key_value_file("/proc/meminfo") {
        let kb = |key: &str| mem_info.get(key).copied().unwrap_or(0);

        let total = kb("MemTotal") * 1024;
        let free = kb("MemFree") * 1024;
        let mut available = kb("MemAvailable") * 1024;
        let cached = kb("Cached") * 1024;
        let buffers = kb("Buffers") * 1024;

        if available == 0 {
            available = free;
        }

        let used = total.saturating_sub(available);
        let used_percent = if total > 0 {
            used as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        raw.memory_available = total > 0;
        raw.memory_total_bytes = total;
        raw.memory_used_bytes = used;
        raw.memory_free_bytes = free;
        raw.memory_available_bytes = available;
        raw.memory_cached_bytes = cached;
        raw.memory_buffers_bytes = buffers;
        raw.memory_used_percent = used_percent;

        let swap_total = kb("SwapTotal") * 1024;
        let swap_free = kb("SwapFree") * 1024;
        let swap_used = swap_total.saturating_sub(swap_free);
        let swap_used_percent = if swap_total > 0 {
            swap_used as f64 / swap_total as f64 * 100.0
        } else {
            0.0
        };

        raw.swap_available = true;
        raw.swap_total_bytes = swap_total;
        raw.swap_used_bytes = swap_used;
        raw.swap_free_bytes = swap_free;
        raw.swap_used_percent = swap_used_percent;
    }

    if let Some(vmstat) = parse_key_value_file("/proc/vmstat") {
        if let Some(&value) = vmstat.get("pgfault") {
            raw.has_page_faults = true;
            raw.page_faults_total = value;
        }
        if let Some(&value) = vmstat.get("pgmajfault") {
            raw.has_major_page_faults = true;
            raw.major_page_faults_total = value;
        }
        if let Some(&value) = vmstat.get("pgpgin") {
            raw.has_page_in = true;
            raw.page_in_total = value;
        }
        if let Some(&value) = vmstat.get("pgpgout") {
            raw.has_page_out = true;
            raw.page_out_total = value;
        }

        let page_size = page_size_bytes();
        if let Some(&value) = vmstat.get("pswpin") {
            raw.swap_in_bytes_total = value.saturating_mul(page_size);
        }
        if let Some(&value) = vmstat.get("pswpout") {
            raw.swap_out_bytes_total = value.saturating_mul(page_size);
        }
    }
}

fn parse_disk_io_counters(raw: &mut RawHostSnapshot) {
    let Ok(content) = std::fs::read_to_string("/proc/diskstats") else {
        return;
    };

    let mut read_ops = 0u64;
    let mut write_ops = 0u64;
    let mut read_sectors = 0u64;
    let mut write_sectors = 0u64;
    let mut io_time_ms = 0u64;
    let mut seen = false;

    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 14 {
            continue;
        }

        if !include_disk_device(fields[2]) {
            continue;
        }

        read_ops = read_ops.saturating_add(parse_u64(fields[3]));
        read_sectors = read_sectors.saturating_add(parse_u64(fields[5]));
        write_ops = write_ops.saturating_add(parse_u64(fields[7]));
        write_sectors = write_sectors.saturating_add(parse_u64(fields[9]));
        io_time_ms = io_time_ms.saturating_add(parse_u64(fields[12]));
        seen = true;
    }

    if !seen {
        return;
    }

    raw.has_disk_io_counters = true;
    raw.disk_read_ops_total = read_ops;
    raw.disk_write_ops_total = write_ops;
    raw.disk_read_bytes_total = read_sectors.saturating_mul(512);
    raw.disk_write_bytes_total = write_sectors.saturating_mul(512);
    raw.has_disk_io_time = true;
    raw.disk_io_time_seconds = io_time_ms as f64 / 1000.0;
}

/// Whole-device filter for `/proc/diskstats` aggregation: virtual and
/// partition entries would double-count.
fn include_disk_device(name: &str) -> bool {
    if name.starts_with("loop") || name.starts_with("ram") {
        return false;
    }

    if name.starts_with("nvme") && name.contains('p') {
        return false;
    }

    if name.starts_with("mmcblk") && name.contains('p') {
        return false;
    }

    ["sd", "hd", "vd", "xvd", "nvme", "mmcblk", "dm-", "md"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

fn parse_throttling(raw: &mut RawHostSnapshot) {
    let paths = ["/sys/fs/cgroup/cpu.stat", "/sys/fs/cgroup/cpu/cpu.stat"];

    for path in paths {
        let Some(stats) = parse_key_value_file(path) else {
            continue;
        };

        if let Some(&value) = stats.get("nr_throttled") {
            raw.has_throttled_total = true;
            raw.throttled_total = value;
        }
        if let Some(&value) = stats.get("throttled_usec") {
            raw.has_throttled_seconds = true;
            raw.throttled_seconds = value as f64 / 1_000_000.0;
            return;
        }
        if let Some(&value) = stats.get("throttled_time") {
            raw.has_throttled_seconds = true;
            raw.throttled_seconds = value as f64 / 1_000_000_000.0;
            return;
        }
    }
}

/// Parses `key value` / `Key:  value kB` lines into raw numbers; unit
/// scaling is the caller's concern.
fn parse_key_value_file(path: &str) -> Option<HashMap<String, u64>> {
    let content = std::fs::read_to_string(path).ok()?;

    let mut values = HashMap::new();
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let Some(key) = fields.next() else {
            continue;
        };
        let Some(value) = fields.next() else {
            continue;
        };
        let Ok(parsed) = value.parse::<u64>() else {
            continue;
        };
        values.insert(key.trim_end_matches(':').to_owned(), parsed);
    }
    Some(values)
}

fn parse_u64(field: &str) -> u64 {
    field.parse().unwrap_or(0)
}

fn page_size_bytes() -> u64 {
    // SAFETY: sysconf has no memory-safety preconditions.
    let value = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if value > 0 {
        value as u64
    } else {
        4096
    }
}

#[cfg(test)]
mod tests {
    use super::include_disk_device;

    #[test]
    fn device_filter_admits_whole_devices_only() {
        for device in ["sda", "sda1", "nvme0n1", "mmcblk0", "dm-0", "md127", "vdb"] {
            assert!(include_disk_device(device), "{device} should be included");
        }
        for device in ["loop0", "ram1", "nvme0n1p2", "mmcblk0p1", "sr0", "zram0"] {
            assert!(!include_disk_device(device), "{device} should be excluded");
        }
    }
}
