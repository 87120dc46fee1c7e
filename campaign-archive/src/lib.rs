//! The archive layer: an append-only HDF5 file with `Pregoldenrun`,
//! `Goldenrun` and `fault/experimentNNNN` groups, plus a `Backup` section
//! recorded once before any worker starts, enabling crash-safe resumption
//! (hash-verified re-open, or a `--missing-only` filter over already
//! recorded canonical fault identities).

mod backup;
mod error;
mod hash;
mod resume;
mod schema;
mod writer;

pub use backup::{read_backup, write_backup, BackupRecord};
pub use error::ArchiveError;
pub use hash::{compute_input_hashes, first_mismatch, hash_file, InputHashes, InputPaths, HASH_ALGORITHM};
pub use resume::filter_missing_only;
pub use schema::{experiment_group_name, GROUP_BACKUP, GROUP_FAULT_ROOT, GROUP_GOLDEN, GROUP_PREGOLDEN};
pub use writer::{CampaignArchive, ExperimentOutcome};
