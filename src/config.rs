//! Configuration recognized by the core storage engine.
//!
//! Volume-string parsing ("128m"), CLI flags, and cluster-level config
//! distribution are the collaborators' concern; by the time a `Config`
//! reaches [`crate::Node`], `trunks_size` and `memory_size` are already
//! plain byte counts.

use std::path::PathBuf;
use std::time::Duration;

/// Process-wide default segment size (8 MiB), per the reference layout.
pub const DEFAULT_SEGMENT_SIZE: usize = 8 * 1024 * 1024;

/// Alive-ratio floor below which the defragmenter compacts a segment.
pub const DEFAULT_DEFRAG_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct Config {
    /// Bytes per trunk.
    pub trunks_size: usize,
    /// Total bytes available to this node; `trunk_count = memory_size / trunks_size`.
    pub memory_size: usize,
    /// Per-segment byte size. Defaults to [`DEFAULT_SEGMENT_SIZE`].
    pub segment_size: usize,
    /// Alive ratio below which a segment is compacted.
    pub defrag_threshold: f64,
    /// Fallback tick period between proactive defragmentation sweeps.
    pub defrag_interval: Duration,
    /// Number of striped per-cell lock buckets per trunk.
    pub lock_stripes: usize,
    /// Enables dirty-range-driven durability. When `false`, [`crate::Node`]
    /// does not start a backup loop (dirty ranges are still recorded —
    /// cheap bookkeeping the defragmenter also relies on for its own
    /// segment scans — but nothing ever drains them).
    pub durability: bool,
    /// Number of replica targets per trunk.
    pub replication: usize,
    /// Directories backing each replica target, one per `replication` slot.
    pub replica_dirs: Vec<PathBuf>,
    /// Enables the periodic backup loop.
    pub auto_backsync: bool,
    /// Interval between backup cycles, when `auto_backsync` is set.
    pub backsync_interval: Duration,
    /// Run recovery from `replica_dirs` before serving traffic.
    pub recover_backup_at_startup: bool,
    /// Retain replica directories already marked `imported` instead of
    /// leaving them for the operator to prune.
    pub keep_imported_backup: bool,
    /// Recovery parallelism ceiling; `None` derives it from detected CPU
    /// count the way [`crate::resource`] does for other tuning knobs.
    pub recovery_parallelism: Option<usize>,
}

impl Config {
    pub fn trunk_count(&self) -> usize {
        (self.memory_size / self.trunks_size).max(1)
    }

    pub fn segments_per_trunk(&self) -> usize {
        (self.trunks_size / self.segment_size).max(1)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trunks_size: 256 * 1024 * 1024,
            memory_size: 1024 * 1024 * 1024,
            segment_size: DEFAULT_SEGMENT_SIZE,
            defrag_threshold: DEFAULT_DEFRAG_THRESHOLD,
            defrag_interval: Duration::from_secs(30),
            lock_stripes: 256,
            durability: false,
            replication: 1,
            replica_dirs: Vec::new(),
            auto_backsync: false,
            backsync_interval: Duration::from_secs(5),
            recover_backup_at_startup: false,
            keep_imported_backup: false,
            recovery_parallelism: None,
        }
    }
}
