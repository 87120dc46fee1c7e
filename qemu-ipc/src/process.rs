//! Spawns the emulator binary with the exact argument order the plugin
//! expects.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::error::IpcError;
use crate::fifo::WorkerFifos;

/// Everything needed to build the emulator command line for one worker.
#[derive(Debug, Clone)]
pub struct EmulatorLaunch {
    pub emulator_path: PathBuf,
    pub plugin_path: PathBuf,
    pub machine: String,
    pub bios_path: Option<PathBuf>,
    pub kernel_path: Option<PathBuf>,
    pub debug_plugin: bool,
    pub custom_args: Vec<String>,
    pub gdb: bool,
}

impl EmulatorLaunch {
    /// Build the argument vector, in the fixed order the emulator plugin
    /// requires: plugin descriptor, machine, monitor, optional debug flag,
    /// custom-arg tokens, bios, kernel, then the gdb stub pair.
    pub fn args(&self, fifos: &WorkerFifos) -> Vec<String> {
        let mut args = Vec::new();
        args.push("-plugin".to_string());
        args.push(format!(
            "{},control={},config={},data={}",
            self.plugin_path.display(),
            fifos.control.display(),
            fifos.config.display(),
            fifos.data.display()
        ));
        args.push("-M".to_string());
        args.push(self.machine.clone());
        args.push("-monitor".to_string());
        args.push("none".to_string());
        if self.debug_plugin {
            args.push("-d".to_string());
            args.push("plugin".to_string());
        }
        args.extend(self.custom_args.iter().cloned());
        if let Some(bios) = &self.bios_path {
            args.push("-bios".to_string());
            args.push(bios.display().to_string());
        }
        if let Some(kernel) = &self.kernel_path {
            args.push("-kernel".to_string());
            args.push(kernel.display().to_string());
        }
        if self.gdb {
            args.push("-S".to_string());
            args.push("-s".to_string());
        }
        args
    }

    pub fn spawn(&self, fifos: &WorkerFifos) -> Result<Child, IpcError> {
        let args = self.args(fifos);
        Command::new(&self.emulator_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(IpcError::Spawn)
    }
}

/// Send `SIGKILL` to a running emulator child. Used on the cancellation
/// path; best-effort, a process that already exited is not an error.
pub fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

pub fn plugin_path_exists(path: &Path) -> bool {
    path.exists()
}
