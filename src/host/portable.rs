use std::path::Path;

use sysinfo::{Disks, MemoryRefreshKind, RefreshKind, System};

use super::{disk_usage_for_path, RawHostSnapshot};

/// Portable backend over `sysinfo`: overall CPU usage, memory, swap, and
/// disk usage. Per-mode CPU times, page-fault and disk IO counters are not
/// exposed here, so their sections stay unavailable.
pub(super) struct Backend {
    system: System,
    disks: Disks,
}

impl Backend {
    pub(super) fn new() -> Self {
        let mut system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(sysinfo::CpuRefreshKind::new().with_cpu_usage())
                .with_memory(MemoryRefreshKind::everything()),
        );
        // Prime CPU usage; percentages need two refreshes to be meaningful.
        system.refresh_cpu_usage();
        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
        }
    }

    pub(super) fn collect_raw(&mut self, disk_path: &Path) -> RawHostSnapshot {
        let mut raw = RawHostSnapshot::default();

        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let usage = f64::from(self.system.global_cpu_info().cpu_usage());
        if usage.is_finite() {
            // sysinfo exposes only overall usage; attribute the busy share
            // to user time.
            raw.cpu_usage_available = true;
            raw.cpu_idle_percent = 100.0 - usage;
            raw.cpu_user_percent = usage;
            raw.cpu_system_percent = 0.0;
        }

        let total = self.system.total_memory();
        if total > 0 {
            let free = self.system.free_memory();
            let available = self.system.available_memory();
            let available = if available == 0 { free } else { available };
            let used = total.saturating_sub(available);

            raw.memory_available = true;
            raw.memory_total_bytes = total;
            raw.memory_used_bytes = used;
            raw.memory_free_bytes = free;
            raw.memory_available_bytes = available;
            raw.memory_used_percent = used as f64 / total as f64 * 100.0;
        }

        let swap_total = self.system.total_swap();
        let swap_used = self.system.used_swap();
        raw.swap_available = true;
        raw.swap_total_bytes = swap_total;
        raw.swap_used_bytes = swap_used;
        raw.swap_free_bytes = swap_total.saturating_sub(swap_used);
        raw.swap_used_percent = if swap_total > 0 {
            swap_used as f64 / swap_total as f64 * 100.0
        } else {
            0.0
        };

        self.disks.refresh();
        disk_usage_for_path(&self.disks, disk_path, &mut raw);

        raw
    }
}
