//! Command-line surface, matching spec §6's CLI contract exactly.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "faultline", about = "Fault-injection campaign orchestrator for emulated firmware")]
pub struct Cli {
    /// Emulator configuration document (qemu path, kernel, plugin, machine, bios).
    #[arg(long)]
    pub qemu: PathBuf,

    /// Fault configuration document describing the campaign.
    #[arg(long)]
    pub faults: PathBuf,

    /// The HDF5 archive to write (or resume/append to).
    pub hdf5file: PathBuf,

    /// Re-open an existing archive and append to it rather than failing.
    #[arg(short, long)]
    pub append: bool,

    /// Number of concurrent worker threads.
    #[arg(short, long, default_value_t = 1)]
    pub worker: usize,

    /// Maximum number of completed-but-unlogged results allowed to queue up.
    #[arg(long, default_value_t = 15)]
    pub queuedepth: usize,

    /// HDF5 deflate compression level, 0-9.
    #[arg(short = 'c', long, default_value_t = 1)]
    pub compressionlevel: u8,

    /// First experiment index to assign (for appending a second run onto an existing archive).
    #[arg(short = 'b', long, default_value_t = 0)]
    pub indexbase: u64,

    /// Enable verbose/debug logging and pass `-d plugin` to the emulator.
    #[arg(long)]
    pub debug: bool,

    /// Attach a GDB stub (`-S -s`); forces `--worker 1`.
    #[arg(long)]
    pub gdb: bool,

    /// Disable the emulator's tbexec ring buffer, forcing full artefact filtering.
    #[arg(long)]
    pub disable_ring_buffer: bool,

    /// Overwrite an existing archive instead of resuming from it.
    #[arg(short, long)]
    pub overwrite: bool,

    /// Run only the pre-golden and golden phases, then exit.
    #[arg(long)]
    pub goldenrun_only: bool,

    /// Skip fault combinations already recorded in an existing archive.
    #[arg(short, long)]
    pub missing_only: bool,
}
