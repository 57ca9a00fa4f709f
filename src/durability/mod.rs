//! Asynchronous durability: dirty-range coalescing (tracked on
//! [`crate::trunk::Trunk`] directly), the replica file format, the backup
//! cycle driver, and recovery.
//!
//! There is no durable write-ahead on the hot path — see the crate's
//! non-goals. A cell is acknowledged to its caller the moment the codec
//! write and index insertion complete; everything in this module ships
//! already-committed bytes to a replica asynchronously.

pub mod recovery;
pub mod replica;
pub mod writer;

pub use recovery::{recover_directory, RecoveryReport};
pub use replica::{ReplicaFile, ReplicaFileView};
pub use writer::{backup_now, sync_trunk_segment, DurabilityWriter};
