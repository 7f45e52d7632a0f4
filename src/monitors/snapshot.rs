//! Snapshot sources
//!
//! The scheduler only depends on [`SnapshotSource`]; [`SysinfoSource`] is the
//! production implementation backed by `sysinfo`.

use async_trait::async_trait;
use sysinfo::{Disks, Networks, ProcessesToUpdate, System};
use tracing::{debug, instrument, trace};

use crate::config::MetricsOptions;
use crate::{
    CpuMetrics, DiskMetrics, MemoryMetrics, NetworkMetrics, ProcessMetrics, Snapshot, SwapMetrics,
};

/// Produces one snapshot per collection cycle
#[async_trait]
pub trait SnapshotSource: Send {
    async fn snapshot(&mut self) -> anyhow::Result<Snapshot>;
}

/// Reads host metrics through `sysinfo`
pub struct SysinfoSource {
    system: System,
    options: MetricsOptions,
    hostname: String,
}

impl SysinfoSource {
    pub fn new(options: MetricsOptions) -> Self {
        Self {
            system: System::new(),
            options,
            hostname: crate::util::hostname(),
        }
    }

    fn cpu(&self) -> CpuMetrics {
        let logical = self.system.cpus().len().max(1);
        let load = System::load_average();
        let load_avg = if cfg!(windows) {
            None
        } else {
            Some([load.one, load.five, load.fifteen])
        };

        CpuMetrics {
            percent: f64::from(self.system.global_cpu_usage()).clamp(0.0, 100.0),
            count: System::physical_core_count().unwrap_or(logical),
            count_logical: logical,
            load_avg,
        }
    }

    fn memory(&self) -> MemoryMetrics {
        let total = self.system.total_memory();
        let available = self.system.available_memory();
        let used = self.system.used_memory();

        MemoryMetrics {
            total,
            available,
            used,
            free: self.system.free_memory(),
            percent: percent_of(total.saturating_sub(available), total),
            buffers: 0,
            cached: 0,
        }
    }

    fn swap(&self) -> SwapMetrics {
        let total = self.system.total_swap();
        let used = self.system.used_swap();

        SwapMetrics {
            total,
            used,
            free: self.system.free_swap(),
            percent: percent_of(used, total),
        }
    }

    fn disks() -> Vec<DiskMetrics> {
        let disks = Disks::new_with_refreshed_list();

        disks
            .list()
            .iter()
            .filter(|disk| disk.total_space() > 0)
            .map(|disk| {
                let total = disk.total_space();
                let free = disk.available_space();
                let used = total.saturating_sub(free);

                DiskMetrics {
                    device: disk.name().to_string_lossy().to_string(),
                    mountpoint: disk.mount_point().to_string_lossy().to_string(),
                    fstype: disk.file_system().to_string_lossy().to_string(),
                    total,
                    used,
                    free,
                    percent: percent_of(used, total),
                }
            })
            .collect()
    }

    fn network() -> NetworkMetrics {
        let networks = Networks::new_with_refreshed_list();

        networks.iter().fold(
            NetworkMetrics {
                bytes_sent: 0,
                bytes_recv: 0,
                packets_sent: 0,
                packets_recv: 0,
                errin: 0,
                errout: 0,
                dropin: 0,
                dropout: 0,
            },
            |mut acc, (_, data)| {
                acc.bytes_sent += data.total_transmitted();
                acc.bytes_recv += data.total_received();
                acc.packets_sent += data.total_packets_transmitted();
                acc.packets_recv += data.total_packets_received();
                acc.errin += data.total_errors_on_received();
                acc.errout += data.total_errors_on_transmitted();
                acc
            },
        )
    }

    fn top_processes(&mut self) -> Vec<ProcessMetrics> {
        self.system.refresh_processes(ProcessesToUpdate::All, true);
        let total_memory = self.system.total_memory();

        let mut processes: Vec<ProcessMetrics> = self
            .system
            .processes()
            .values()
            .map(|process| ProcessMetrics {
                pid: process.pid().as_u32(),
                name: process.name().to_string_lossy().to_string(),
                cpu_percent: f64::from(process.cpu_usage()).max(0.0),
                memory_percent: percent_of(process.memory(), total_memory),
            })
            .collect();

        processes.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
        processes.truncate(self.options.top_process_count);
        processes
    }
}

#[async_trait]
impl SnapshotSource for SysinfoSource {
    #[instrument(skip(self), fields(host = %self.hostname))]
    async fn snapshot(&mut self) -> anyhow::Result<Snapshot> {
        // CPU usage is a delta between two refreshes
        self.system.refresh_cpu_usage();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let top_processes = if self.options.include_processes {
            Some(self.top_processes())
        } else {
            None
        };

        let snapshot = Snapshot {
            timestamp: Snapshot::now_timestamp(),
            hostname: self.hostname.clone(),
            cpu: self.cpu(),
            memory: self.memory(),
            swap: self.swap(),
            disk: Self::disks(),
            network: self.options.include_network.then(Self::network),
            top_processes,
            error: None,
        };

        trace!(
            "collected snapshot: cpu {:.1}%, memory {:.1}%, {} disk(s)",
            snapshot.cpu.percent,
            snapshot.memory.percent,
            snapshot.disk.len()
        );
        debug!("snapshot collected");

        Ok(snapshot)
    }
}

/// `part / total` as a percentage, 0 when `total` is 0
pub fn percent_of(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((part as f64 / total as f64) * 100.0).clamp(0.0, 100.0)
}
