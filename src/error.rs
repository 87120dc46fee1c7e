//! The root error type: wraps each component crate's error without losing
//! its identity, the way a top-level interpreter error wraps its storage
//! and validation errors.

use thiserror::Error;

/// Top-level campaign error. Every fallible stage of the controller reports
/// through this type; `main` maps it to the process exit code from spec §6
/// (0 on success, 1 on any `CampaignError`).
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Expansion(#[from] fault_expand::ExpansionError),

    #[error(transparent)]
    GoldenRun(#[from] golden_run::GoldenRunError),

    #[error(transparent)]
    Archive(#[from] campaign_archive::ArchiveError),

    #[error(transparent)]
    Ipc(#[from] qemu_ipc::IpcError),

    #[error("i/o error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised validating the emulator and fault configuration documents
/// before any emulator is spawned (spec §7, "Configuration error").
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path} as JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A `counter` of `0` was given for `start` or `end` in the fault
    /// config document.
    #[error("{field}.counter must be nonzero")]
    ZeroCounter { field: &'static str },

    /// The legacy `fault_livespan` key, rejected with a hint towards the
    /// correct spelling (Scenario D).
    #[error("unknown fault configuration property 'fault_livespan'; did you mean 'fault_lifespan'?")]
    ObsoleteField,

    #[error("--gdb requires --worker 1 (got {worker})")]
    GdbRequiresSingleWorker { worker: usize },

    /// The target archive already exists and neither `--append` nor
    /// `--overwrite` was given, so the ambiguity is rejected rather than
    /// guessed at.
    #[error("archive {path} already exists; pass --append to resume or --overwrite to replace it")]
    ArchiveExistsNeedsFlag { path: String },
}
