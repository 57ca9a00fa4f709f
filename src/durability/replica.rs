//! On-disk replica file: a per-trunk mirror of segment content.
//!
//! Layout:
//! ```text
//! [file header]      int32 segment_size
//! [segment record 0] int32 seg_append_header || segment_size bytes
//! [segment record 1] int32 seg_append_header || segment_size bytes
//! ...
//! ```
//! Every multi-byte integer is little-endian, matching the cell header and
//! codec. Segment records sit at a fixed offset keyed by `segment_id`, so a
//! dirty-range write only ever touches the bytes it changed.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use memmap2::Mmap;

use crate::error::{NebError, Result};

const FILE_HEADER_SIZE: u64 = 4;
const SEG_HEADER_SIZE: u64 = 4;

pub struct ReplicaFile {
    file: File,
    segment_size: usize,
    segment_count: usize,
}

impl ReplicaFile {
    /// Open (creating if absent) the replica file for one trunk, sized for
    /// `segment_count` segments of `segment_size` bytes each.
    pub fn open(path: &Path, segment_count: usize, segment_size: usize) -> Result<Self> {
        let existed = path.exists();
        let mut file = OpenOptions::new().read(true).write(true).create(true).open(path)?;

        if !existed {
            file.write_all(&(segment_size as u32).to_le_bytes())?;
            let zero_record = vec![0u8; (SEG_HEADER_SIZE as usize) + segment_size];
            for _ in 0..segment_count {
                file.write_all(&zero_record)?;
            }
            file.flush()?;
        } else {
            let mut header = [0u8; 4];
            file.read_exact(&mut header)?;
            let stored_segment_size = u32::from_le_bytes(header) as usize;
            if stored_segment_size != segment_size {
                return Err(NebError::CorruptReplica(format!(
                    "replica segment_size {stored_segment_size} does not match configured {segment_size}"
                )));
            }
        }

        Ok(Self { file, segment_size, segment_count })
    }

    fn segment_offset(&self, segment_id: usize) -> u64 {
        FILE_HEADER_SIZE + segment_id as u64 * (SEG_HEADER_SIZE + self.segment_size as u64)
    }

    /// Write `bytes` at `[base_offset, base_offset + bytes.len())` within
    /// `segment_id`'s mirrored content, and record the segment's current
    /// append head.
    pub fn write_range(&mut self, segment_id: usize, base_offset: usize, append_head: usize, bytes: &[u8]) -> Result<()> {
        if base_offset + bytes.len() > self.segment_size {
            return Err(NebError::CorruptReplica(format!(
                "dirty range [{base_offset}, {}) exceeds segment_size {}",
                base_offset + bytes.len(),
                self.segment_size
            )));
        }
        let seg_off = self.segment_offset(segment_id);
        self.file.seek(SeekFrom::Start(seg_off))?;
        self.file.write_all(&(append_head as u32).to_le_bytes())?;
        self.file.seek(SeekFrom::Start(seg_off + SEG_HEADER_SIZE + base_offset as u64))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    /// Read one segment's mirrored content back, for recovery: returns
    /// `(seg_append_header, full segment bytes)`.
    pub fn read_segment(&mut self, segment_id: usize) -> Result<(usize, Vec<u8>)> {
        let seg_off = self.segment_offset(segment_id);
        self.file.seek(SeekFrom::Start(seg_off))?;
        let mut header = [0u8; 4];
        self.file.read_exact(&mut header)?;
        let seg_append_header = u32::from_le_bytes(header) as usize;
        if seg_append_header > self.segment_size {
            return Err(NebError::CorruptReplica(format!(
                "segment {segment_id} append header {seg_append_header} exceeds segment_size {}",
                self.segment_size
            )));
        }
        let mut buf = vec![0u8; self.segment_size];
        self.file.read_exact(&mut buf)?;
        Ok((seg_append_header, buf))
    }
}

/// Read-only, memory-mapped view of a replica file, used by recovery's
/// segment scan instead of `ReplicaFile`'s seek-and-copy path: recovery
/// never mutates the file, so it maps it once and slices directly into the
/// mapping rather than copying every segment into a fresh `Vec`.
pub struct ReplicaFileView {
    mmap: Mmap,
    segment_size: usize,
    segment_count: usize,
}

impl ReplicaFileView {
    pub fn open(path: &Path, segment_count: usize, segment_size: usize) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the file is only ever written by `ReplicaFile` through
        // its own handle, never concurrently with a recovery scan over the
        // same directory (recovery runs against a directory the writer has
        // finished with, per the "imported" marker protocol).
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.len() < FILE_HEADER_SIZE as usize {
            return Err(NebError::CorruptReplica("replica file shorter than its header".into()));
        }
        let stored_segment_size = u32::from_le_bytes(mmap[0..4].try_into().unwrap()) as usize;
        if stored_segment_size != segment_size {
            return Err(NebError::CorruptReplica(format!(
                "replica segment_size {stored_segment_size} does not match configured {segment_size}"
            )));
        }
        Ok(Self { mmap, segment_size, segment_count })
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    fn segment_offset(&self, segment_id: usize) -> usize {
        FILE_HEADER_SIZE as usize + segment_id * (SEG_HEADER_SIZE as usize + self.segment_size)
    }

    /// `(seg_append_header, segment bytes)`, the latter a zero-copy slice
    /// into the mapping.
    pub fn read_segment(&self, segment_id: usize) -> Result<(usize, &[u8])> {
        let off = self.segment_offset(segment_id);
        let record_end = off + SEG_HEADER_SIZE as usize + self.segment_size;
        if record_end > self.mmap.len() {
            return Err(NebError::CorruptReplica(format!("segment {segment_id} record extends past end of file")));
        }
        let seg_append_header = u32::from_le_bytes(self.mmap[off..off + 4].try_into().unwrap()) as usize;
        if seg_append_header > self.segment_size {
            return Err(NebError::CorruptReplica(format!(
                "segment {segment_id} append header {seg_append_header} exceeds segment_size {}",
                self.segment_size
            )));
        }
        let body_off = off + SEG_HEADER_SIZE as usize;
        Ok((seg_append_header, &self.mmap[body_off..body_off + self.segment_size]))
    }
}
