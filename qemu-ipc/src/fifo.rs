//! Creation and teardown of the three named pipes a worker uses to talk to
//! its emulator instance.

use std::fs;
use std::path::{Path, PathBuf};

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tracing::debug;

use crate::error::IpcError;

#[derive(Debug, Clone)]
pub struct WorkerFifos {
    pub control: PathBuf,
    pub config: PathBuf,
    pub data: PathBuf,
}

impl WorkerFifos {
    /// Allocate the fixed `/tmp/qemu_fault/<pid>/{control,config,data}`
    /// paths for a worker identified by `worker_id` (not necessarily an OS
    /// pid, just a unique per-worker tag), creating the parent directory.
    pub fn create(worker_id: u64) -> Result<Self, IpcError> {
        let dir = PathBuf::from("/tmp/qemu_fault").join(worker_id.to_string());
        fs::create_dir_all(&dir).map_err(|source| IpcError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let fifos = Self {
            control: dir.join("control"),
            config: dir.join("config"),
            data: dir.join("data"),
        };
        for path in [&fifos.control, &fifos.config, &fifos.data] {
            make_fifo(path)?;
        }
        debug!(?dir, "created worker fifos");
        Ok(fifos)
    }

    pub fn directory(&self) -> Option<&Path> {
        self.control.parent()
    }

    /// Remove all three pipes and their parent directory. Safe to call more
    /// than once, including from the cancellation path after a worker was
    /// killed mid-run.
    pub fn remove(&self) {
        if let Some(dir) = self.directory() {
            if let Err(err) = fs::remove_dir_all(dir) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(?dir, %err, "failed to remove worker fifo directory");
                }
            }
        }
    }
}

fn make_fifo(path: &Path) -> Result<(), IpcError> {
    match mkfifo(path, Mode::from_bits_truncate(0o664)) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::EEXIST) => Ok(()),
        Err(source) => Err(IpcError::Mkfifo {
            path: path.display().to_string(),
            source,
        }),
    }
}

impl Drop for WorkerFifos {
    fn drop(&mut self) {
        self.remove();
    }
}
