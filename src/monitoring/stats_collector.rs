use std::time::Instant;

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};

use super::PlayerMetrics;
use crate::protocol::{Cpu, Memory, Stats};

/// Builds the `stats` payload. CPU loads are measured between calls, so
/// the first sample after startup reads low.
pub struct StatsCollector {
    system: Mutex<System>,
    pid: Option<Pid>,
    started: Instant,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
            started: Instant::now(),
        }
    }

    pub fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn collect(&self, metrics: &PlayerMetrics) -> Stats {
        let mut sys = self.system.lock();
        sys.refresh_memory();
        sys.refresh_cpu_usage();

        let cores = sys.cpus().len().max(1);
        let system_load = f64::from(sys.global_cpu_usage()) / 100.0;

        let (process_load, process_memory) = match self.pid {
            Some(pid) => {
                sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                sys.process(pid)
                    .map(|p| (f64::from(p.cpu_usage()) / 100.0 / cores as f64, p.memory()))
                    .unwrap_or((0.0, 0))
            }
            None => (0.0, 0),
        };

        let total = sys.total_memory();
        Stats {
            players: metrics.players(),
            playing_players: metrics.playing_players(),
            uptime: self.uptime_ms(),
            memory: Memory {
                free: sys.free_memory(),
                used: process_memory,
                allocated: process_memory,
                reservable: total,
            },
            cpu: Cpu {
                cores,
                system_load: system_load.clamp(0.0, 1.0),
                process_load: process_load.clamp(0.0, 1.0),
            },
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}
