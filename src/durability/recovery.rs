//! Recovery: reconstruct trunk contents from a replica directory written by
//! [`super::writer`].
//!
//! A replica file is opened read-only and memory-mapped
//! ([`ReplicaFileView`]) rather than read into a buffer, since recovery only
//! ever scans it once and never mutates it. Segments are recovered in
//! parallel, bounded by a pool sized by
//! [`crate::resource::recovery_parallelism`]; within a segment, the cells
//! found there install in parallel on a second, equally-bounded pool. A
//! corrupt segment is logged and skipped rather than aborting the whole
//! directory — partial recovery is acceptable per the error-handling
//! design.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::durability::replica::ReplicaFileView;
use crate::error::Result;
use crate::header::{CellHeader, CellType, CELL_HEADER_SIZE};
use crate::id::CellId;
use crate::trunk_store::TrunkStore;

const IMPORTED_MARKER: &str = ".imported";

#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryReport {
    pub installed: usize,
    pub skipped_stale: usize,
    pub tombstones_skipped: usize,
    pub corrupt_segments: usize,
}

impl RecoveryReport {
    fn merge(self, other: RecoveryReport) -> RecoveryReport {
        RecoveryReport {
            installed: self.installed + other.installed,
            skipped_stale: self.skipped_stale + other.skipped_stale,
            tombstones_skipped: self.tombstones_skipped + other.tombstones_skipped,
            corrupt_segments: self.corrupt_segments + other.corrupt_segments,
        }
    }
}

fn is_imported(dir: &Path) -> bool {
    dir.join(IMPORTED_MARKER).exists()
}

fn mark_imported(dir: &Path) -> Result<()> {
    fs::write(dir.join(IMPORTED_MARKER), b"")?;
    Ok(())
}

fn trunk_file_id(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("trunk_")?.parse().ok()
}

/// Recover every trunk replica file in `dir` into `store`, unless `dir` is
/// already marked imported. Deletes `dir` afterward unless
/// `keep_imported_backup` is set.
pub fn recover_directory(store: &TrunkStore, dir: &Path, segment_size: usize, parallelism: usize, keep_imported_backup: bool) -> Result<RecoveryReport> {
    if is_imported(dir) {
        tracing::debug!(dir = %dir.display(), "replica directory already imported, skipping");
        return Ok(RecoveryReport::default());
    }

    let mut trunk_files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if trunk_file_id(&path).is_some() {
            trunk_files.push(path);
        }
    }

    let pool = rayon::ThreadPoolBuilder::new().num_threads(parallelism.max(1)).build().map_err(|e| crate::error::NebError::Codec(e.to_string()))?;
    let report = pool.install(|| {
        trunk_files
            .par_iter()
            .map(|path| recover_trunk_file(store, path, segment_size, parallelism))
            .reduce(RecoveryReport::default, RecoveryReport::merge)
    });

    mark_imported(dir)?;
    if !keep_imported_backup {
        fs::remove_dir_all(dir)?;
    }
    Ok(report)
}

fn recover_trunk_file(store: &TrunkStore, path: &Path, segment_size: usize, parallelism: usize) -> RecoveryReport {
    let Some(trunk_id) = trunk_file_id(path) else { return RecoveryReport::default() };
    let segment_count = store.trunks().iter().find(|t| t.id() == trunk_id).map(|t| t.segments().len()).unwrap_or(0);
    if segment_count == 0 {
        tracing::warn!(trunk = %trunk_id, "replica file has no matching live trunk, skipping");
        return RecoveryReport::default();
    }

    let replica = match ReplicaFileView::open(path, segment_count, segment_size) {
        Ok(r) => r,
        Err(err) => {
            tracing::warn!(trunk = %trunk_id, error = %err, "failed to open replica file");
            return RecoveryReport { corrupt_segments: 1, ..Default::default() };
        }
    };

    // Bounds cell-install parallelism independently of the outer
    // segment/trunk-level pool; built once per trunk file, reused across
    // its segments.
    let cell_pool = rayon::ThreadPoolBuilder::new().num_threads(parallelism.max(1)).build();
    let reports: Vec<RecoveryReport> = (0..replica.segment_count())
        .map(|seg_id| match replica.read_segment(seg_id) {
            Ok((seg_append_header, bytes)) => recover_segment_image(store, bytes, seg_append_header, &cell_pool),
            Err(err) => {
                tracing::warn!(trunk = %trunk_id, error = %err, "corrupt segment image, skipping");
                RecoveryReport { corrupt_segments: 1, ..Default::default() }
            }
        })
        .collect();

    reports.into_iter().fold(RecoveryReport::default(), RecoveryReport::merge)
}

fn recover_segment_image(store: &TrunkStore, bytes: &[u8], seg_append_header: usize, pool: &std::result::Result<rayon::ThreadPool, rayon::ThreadPoolBuildError>) -> RecoveryReport {
    let mut cells: Vec<(u64, u64, u64, Vec<u8>, bool)> = Vec::new(); // (partition, hash, version, raw, is_tombstone)
    let mut cursor = 0usize;
    let mut corrupt = 0usize;

    while cursor < seg_append_header {
        let header = match CellHeader::decode(&bytes[cursor..]) {
            Ok(h) => h,
            Err(_) => {
                corrupt += 1;
                break;
            }
        };
        let total = CELL_HEADER_SIZE + header.cell_length as usize;
        if cursor + total > seg_append_header {
            corrupt += 1;
            break;
        }
        let is_tombstone = header.cell_type == CellType::Tombstone;
        cells.push((header.partition, header.hash, header.version, bytes[cursor..cursor + total].to_vec(), is_tombstone));
        cursor += total;
    }

    let installed = AtomicUsize::new(0);
    let skipped_stale = AtomicUsize::new(0);
    let tombstones_skipped = AtomicUsize::new(0);

    let install_one = |(partition, hash, version, raw, is_tombstone): &(u64, u64, u64, Vec<u8>, bool)| {
        if *is_tombstone {
            tombstones_skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let id = CellId::new(*partition, *hash);
        match store.new_cell_by_raw_if_newer(id, *version, raw) {
            Ok(true) => {
                installed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => {
                skipped_stale.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install recovered cell");
            }
        }
    };

    match pool {
        Ok(pool) => pool.install(|| cells.par_iter().for_each(install_one)),
        Err(_) => cells.iter().for_each(install_one),
    }

    RecoveryReport {
        installed: installed.load(Ordering::Relaxed),
        skipped_stale: skipped_stale.load(Ordering::Relaxed),
        tombstones_skipped: tombstones_skipped.load(Ordering::Relaxed),
        corrupt_segments: corrupt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::durability::writer::backup_now;
    use crate::schema::types::{FieldDecl, PrimitiveKind, TypeExpr};
    use crate::schema::SchemaTable;
    use crate::value::{CellMap, CellValue};

    fn store_with(trunk_count: usize, segment_size: usize) -> TrunkStore {
        let config = Config { trunks_size: segment_size, memory_size: segment_size * trunk_count, segment_size, ..Config::default() };
        TrunkStore::new(&config)
    }

    #[test]
    fn recovers_cells_after_simulated_crash() {
        let dir = tempfile::tempdir().unwrap();
        let replica_dirs = vec![dir.path().join("replica")];
        let segment_size = 1024 * 1024;

        let schemas = SchemaTable::new();
        let sid = schemas.add("s", vec![FieldDecl::new("text", TypeExpr::Primitive(PrimitiveKind::Text))], None).unwrap();

        let store = store_with(4, segment_size);
        let mut ids = Vec::new();
        for i in 0..300u64 {
            let partition = i % 4;
            let hash = i;
            let id = CellId::new(partition, hash);
            let value: CellMap = [("text".to_string(), CellValue::Text(format!("payload-{i}-{}", "x".repeat(200))))].into_iter().collect();
            store.new_cell(&schemas, id, sid, &value).unwrap();
            ids.push(id);
        }

        backup_now(store.trunks(), &replica_dirs, segment_size).unwrap();

        // simulate a crash: a fresh store with empty indexes
        let recovered_store = store_with(4, segment_size);
        let report = recover_directory(&recovered_store, &replica_dirs[0], segment_size, 4, true).unwrap();
        assert_eq!(report.installed, 300);

        for (i, id) in ids.iter().enumerate() {
            let read = recovered_store.read_cell(&schemas, *id).unwrap();
            assert_eq!(read.get("text"), Some(&CellValue::Text(format!("payload-{i}-{}", "x".repeat(200)))));
        }
    }

    #[test]
    fn already_imported_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join(IMPORTED_MARKER), b"").unwrap();

        let store = store_with(1, 4096);
        let report = recover_directory(&store, dir.path(), 4096, 2, true).unwrap();
        assert_eq!(report.installed, 0);
    }
}
