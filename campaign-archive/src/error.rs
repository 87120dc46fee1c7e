/// Errors raised by the archive layer: HDF5 I/O, the `Backup` section's
/// resume contract, and input-hash verification.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("hdf5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("i/o error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize archive metadata: {0}")]
    Serde(#[from] serde_json::Error),

    /// `--overwrite` was not passed and the archive exists, but it has no
    /// `Backup` group. The user is told to re-run with `--overwrite`
    /// rather than silently starting a fresh campaign on top of stale data.
    #[error("archive exists but has no Backup section; re-run with --overwrite")]
    BackupMissing,

    /// One of the four hashed inputs (emulator binary, fault config,
    /// kernel, bios) no longer matches what the campaign was recorded
    /// against. Aborts rather than resuming against different inputs.
    #[error("input '{input}' changed since this archive was recorded (hash mismatch)")]
    HashMismatch { input: String },

    /// `hdf5logger.py`'s de-duplication guard: an experiment group name was
    /// already taken after exhausting the configured index width.
    #[error("could not allocate a unique group name for experiment {index}")]
    ExperimentNameExhausted { index: u64 },
}
