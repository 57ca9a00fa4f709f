//! Host RAM/CPU probing used to size recovery parallelism when a
//! [`Config`](crate::config::Config) leaves it unset. Stateless: each call
//! to [`detect`] re-probes the system.

use sysinfo::{CpuRefreshKind, RefreshKind, System};

/// Snapshot of detected hardware resources.
#[derive(Debug, Clone, Copy)]
pub struct SystemResources {
    pub cpu_count: usize,
}

/// Probe the current system for CPU count.
pub fn detect() -> SystemResources {
    let sys = System::new_with_specifics(RefreshKind::new().with_cpu(CpuRefreshKind::everything()));
    let cpu_count = sys.cpus().len().max(1);
    SystemResources { cpu_count }
}

/// `min(10 * node_count, cpu_count)`, per the recovery parallelism rule —
/// `node_count` is external to this single-node core, so callers that don't
/// know it pass `1`.
pub fn recovery_parallelism(node_count: usize, cpu_count: usize) -> usize {
    (10 * node_count.max(1)).min(cpu_count.max(1))
}
