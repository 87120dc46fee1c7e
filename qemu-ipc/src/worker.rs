//! One worker's interaction with its emulator instance: open the three
//! FIFOs in a fixed order, write Control then FaultPack, and block on a
//! single read of Data.

use std::fs::OpenOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::IpcError;
use crate::fifo::WorkerFifos;
use crate::message::{Control, Data, FaultPack};
use crate::process::{kill, EmulatorLaunch};
use crate::wire::{read_message, write_message};

const RSS_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

/// Runs one experiment against one emulator process and returns whatever
/// `Data` the plugin managed to produce, even if the process died
/// mid-run. When `rss_samples` is given, a side thread reports the child's
/// resident set size at a fixed interval for as long as the process lives,
/// for a scheduler to fold into its memory estimate.
pub fn run_experiment(
    worker_id: u64,
    launch: &EmulatorLaunch,
    control: &Control,
    fault_pack: &FaultPack,
    cancel: &Arc<AtomicBool>,
    rss_samples: Option<&Sender<u64>>,
) -> Result<Data, IpcError> {
    let fifos = WorkerFifos::create(worker_id)?;
    let mut child = launch.spawn(&fifos)?;

    if let Some(tx) = rss_samples {
        spawn_rss_sampler(child.id(), tx.clone());
    }

    // Opening a FIFO for writing blocks until a reader attaches, and vice
    // versa; the emulator plugin is expected to open control, then config,
    // then data, in that order, which is why we write eagerly in the same
    // order rather than waiting for an explicit handshake.
    let write_result = (|| -> Result<(), IpcError> {
        let mut control_pipe = OpenOptions::new()
            .write(true)
            .open(&fifos.control)
            .map_err(|source| IpcError::Io {
                path: fifos.control.display().to_string(),
                source,
            })?;
        write_message(&mut control_pipe, control)?;

        let mut config_pipe = OpenOptions::new()
            .write(true)
            .open(&fifos.config)
            .map_err(|source| IpcError::Io {
                path: fifos.config.display().to_string(),
                source,
            })?;
        write_message(&mut config_pipe, fault_pack)
    })();

    if let Err(err) = write_result {
        warn!(worker_id, %err, "failed to hand off control/fault-pack to emulator");
        kill(&mut child);
        fifos.remove();
        return Err(err);
    }

    if cancel.load(Ordering::Relaxed) {
        info!(worker_id, "cancellation observed before data read, killing emulator");
        kill(&mut child);
        fifos.remove();
        return Ok(Data::default());
    }

    let mut data_pipe = OpenOptions::new()
        .read(true)
        .open(&fifos.data)
        .map_err(|source| IpcError::Io {
            path: fifos.data.display().to_string(),
            source,
        })?;
    let data = match read_message::<_, Data>(&mut data_pipe) {
        Ok(data) => data,
        Err(err) => {
            warn!(worker_id, %err, "data read failed or truncated, tolerating partial trace");
            Data::default()
        }
    };

    let _ = child.wait();
    fifos.remove();
    Ok(data)
}

fn spawn_rss_sampler(pid: u32, tx: Sender<u64>) {
    std::thread::spawn(move || loop {
        match read_rss_bytes(pid) {
            Some(bytes) if tx.send(bytes).is_ok() => std::thread::sleep(RSS_SAMPLE_INTERVAL),
            _ => break,
        }
    });
}

fn read_rss_bytes(pid: u32) -> Option<u64> {
    let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    parse_vmrss_kb(&status).map(|kb| kb * 1024)
}

fn parse_vmrss_kb(status: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let rest = line.strip_prefix("VmRSS:")?;
        rest.trim().trim_end_matches("kB").trim().parse().ok()
    })
}
