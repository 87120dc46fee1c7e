//! Runs the pre-golden and golden reference experiments.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use qemu_ipc::{Control, Data, EmulatorLaunch, EndPoint, FaultPack};
use tracing::info;

use crate::error::GoldenRunError;

/// A very large instruction count used as the pre-golden run's cap: the
/// pre-golden run exists purely to reach the configured `start` address,
/// so it must not be artificially truncated.
const PREGOLDEN_MAX_DURATION: u64 = u64::MAX;

#[derive(Debug, Clone)]
pub struct GoldenRunConfig {
    pub start: Option<EndPoint>,
    /// One or more end points; the fault configuration document's `end`
    /// field accepts either a single object or a list (spec.md §6).
    pub ends: Vec<EndPoint>,
    pub configured_max_duration: u64,
    pub tb_exec_list_ring_buffer: bool,
}

/// Drives one worker slot (its own FIFOs and emulator process) through the
/// pre-golden and golden phases.
pub struct GoldenRunDriver<'a> {
    pub worker_id: u64,
    pub launch: &'a EmulatorLaunch,
    pub cancel: Arc<AtomicBool>,
}

impl<'a> GoldenRunDriver<'a> {
    /// Run the pre-golden phase: only performed when a `start` address is
    /// configured. Ends at `start` with an effectively unbounded
    /// instruction budget and an empty fault list.
    pub fn run_pregolden(&self, start: EndPoint) -> Result<Data, GoldenRunError> {
        info!(worker_id = self.worker_id, ?start, "running pre-golden phase");
        let control = Control {
            max_duration: PREGOLDEN_MAX_DURATION,
            num_faults: 0,
            tb_exec_list: true,
            tb_info: true,
            mem_info: false,
            start_address: None,
            end_points: vec![start],
            tb_exec_list_ring_buffer: false,
            full_mem_dump: false,
            memorydumps: vec![],
        };
        let data = qemu_ipc::run_experiment(self.worker_id, self.launch, &control, &FaultPack::default(), &self.cancel, None)?;
        Ok(data)
    }

    /// Run the golden phase: both `start` and `end` set if configured, no
    /// faults.
    pub fn run_golden(&self, config: &GoldenRunConfig) -> Result<Data, GoldenRunError> {
        info!(worker_id = self.worker_id, ?config, "running golden phase");
        let control = Control {
            max_duration: config.configured_max_duration,
            num_faults: 0,
            tb_exec_list: true,
            tb_info: true,
            mem_info: true,
            start_address: config.start,
            end_points: config.ends.clone(),
            tb_exec_list_ring_buffer: config.tb_exec_list_ring_buffer,
            full_mem_dump: false,
            memorydumps: vec![],
        };
        let data = qemu_ipc::run_experiment(self.worker_id, self.launch, &control, &FaultPack::default(), &self.cancel, None)?;
        if data.end_reason.as_deref() == Some("max tb") {
            return Err(GoldenRunError::MaxTbAbort);
        }
        Ok(data)
    }
}
