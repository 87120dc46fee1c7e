//! System and per-process memory accounting feeding the adaptive
//! submission gate.

use std::io::Read;

use crate::error::SchedulerError;

const GIB: u64 = 1024 * 1024 * 1024;
const RESERVED_HEADROOM: u64 = 2 * GIB;
const LARGE_WORKER_THRESHOLD: u64 = (1.5 * GIB as f64) as u64;
const DEFAULT_WORKER_ESTIMATE: u64 = (1.6 * GIB as f64) as u64;

/// Total system RAM in bytes, read from `/proc/meminfo`'s `MemTotal` line
/// (given in kB). A non-Linux port would swap this for the platform's
/// equivalent syscall; this crate only targets the Linux emulator host.
pub fn system_ram_bytes() -> Result<u64, SchedulerError> {
    system_ram_bytes_from_str(&read_meminfo()?)
}

fn read_meminfo() -> Result<String, SchedulerError> {
    let mut contents = String::new();
    std::fs::File::open("/proc/meminfo")
        .and_then(|mut f| f.read_to_string(&mut contents))
        .map_err(|source| SchedulerError::Io {
            path: "/proc/meminfo".to_string(),
            source,
        })?;
    Ok(contents)
}

fn system_ram_bytes_from_str(contents: &str) -> Result<u64, SchedulerError> {
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            let kb: u64 = rest
                .trim()
                .trim_end_matches("kB")
                .trim()
                .parse()
                .map_err(|_| SchedulerError::MemInfoUnparseable)?;
            return Ok(kb * 1024);
        }
    }
    Err(SchedulerError::MemInfoUnparseable)
}

/// The hard ceiling the scheduler submits against: 80% of system RAM minus
/// a 2 GiB safety margin for the controller process itself and the kernel
/// page cache.
pub fn max_ram(system_ram: u64) -> u64 {
    (system_ram as f64 * 0.8) as u64 - RESERVED_HEADROOM.min((system_ram as f64 * 0.8) as u64)
}

/// Estimated memory, in bytes, a new submission would push the campaign
/// to, given the largest observed per-worker RSS (`mem_max_obs`), how many
/// workers are currently running, how many completed results are waiting
/// to be logged (`in_queue`), and the largest (current-duration minus
/// moving-average-duration) across running workers (`time_max`, seconds,
/// clamped to `>= 0`).
///
/// Workers observed to use more than 1.5 GiB get a 1.5x safety multiplier
/// applied to their observed usage (large workers tend to keep growing);
/// smaller or never-yet-observed workers are assumed to cost a flat 1.6
/// GiB. Both terms are then scaled up the longer the slowest worker has
/// been running past its historical average, since a worker running long
/// is a worker whose memory footprint is still climbing.
pub fn mem_estimate(mem_max_obs: u64, running: u64, in_queue: u64, time_max_secs: f64) -> u64 {
    let per_running = if mem_max_obs > LARGE_WORKER_THRESHOLD {
        (mem_max_obs as f64 * running as f64 * 1.5) as u64
    } else {
        DEFAULT_WORKER_ESTIMATE.saturating_mul(running)
    };
    let base = per_running.saturating_add(mem_max_obs.saturating_mul(in_queue));
    let scale = 1.0 + (time_max_secs.max(0.0) / 120.0);
    (base as f64 * scale) as u64
}
