//! HDF5-facing row types and group-naming conventions.
//!
//! Every table is stored as a compound dataset (`hdf5::H5Type`) rather than
//! one dataset per scalar column: this keeps a "row" in the archive
//! addressable the same way `trace-diff`'s in-memory rows are, and lets
//! `h5dump`/`h5py` readers see the same table shape the original PyTables
//! archive exposed. Textual columns (only `TbInfoRow::assembler`) use
//! HDF5's variable-length string type rather than hand-computing a
//! `max(len) + 1` fixed-width column per batch: it is the direct idiomatic
//! equivalent in the Rust HDF5 binding and needs no precomputed width.

use hdf5::types::VarLenAscii;
use hdf5::H5Type;

use trace_diff::{MemDirection, MemInfo, RegisterSnapshot, TbExec, TbInfo};

pub const GROUP_PREGOLDEN: &str = "Pregoldenrun";
pub const GROUP_GOLDEN: &str = "Goldenrun";
pub const GROUP_FAULT_ROOT: &str = "fault";
pub const GROUP_BACKUP: &str = "Backup";

pub const TABLE_TBINFO: &str = "tbinfo";
pub const TABLE_TBEXEC: &str = "tbexec";
pub const TABLE_MEMINFO: &str = "meminfo";
pub const TABLE_REGISTERS_ARM: &str = "registers_arm";
pub const TABLE_REGISTERS_RISCV: &str = "registers_riscv";
pub const TABLE_FAULTS: &str = "faults";

pub const ATTR_ENDPOINT: &str = "endpoint";
pub const ATTR_END_REASON: &str = "end_reason";

/// `experimentNNNN`, zero-padded to the width of `total` (carried over from
/// `hdf5logger.py`'s naming scheme — the distilled spec only says
/// `experimentNNN…`).
pub fn experiment_group_name(index: u64, total: u64) -> String {
    let width = total.max(1).to_string().len();
    format!("experiment{index:0width$}")
}

#[derive(Clone, Debug, H5Type)]
#[repr(C)]
pub struct TbInfoRow {
    pub id: u64,
    pub size: u64,
    pub ins_count: u64,
    pub num_exec: u64,
    pub assembler: VarLenAscii,
}

impl From<&TbInfo> for TbInfoRow {
    fn from(tb: &TbInfo) -> Self {
        Self {
            id: tb.id,
            size: tb.size,
            ins_count: tb.ins_count,
            num_exec: tb.num_exec,
            assembler: VarLenAscii::from_ascii(&tb.assembler).unwrap_or_else(|_| VarLenAscii::from_ascii("").unwrap()),
        }
    }
}

#[derive(Clone, Copy, Debug, H5Type)]
#[repr(C)]
pub struct TbExecRow {
    pub tb: u64,
    pub pos: u64,
}

impl From<&TbExec> for TbExecRow {
    fn from(row: &TbExec) -> Self {
        Self { tb: row.tb, pos: row.pos }
    }
}

#[derive(Clone, Copy, Debug, H5Type)]
#[repr(C)]
pub struct MemInfoRow {
    pub ins_address: u64,
    pub tb_id: u64,
    pub size: u32,
    pub address: u64,
    pub direction: u8,
    pub counter: u64,
}

impl From<&MemInfo> for MemInfoRow {
    fn from(row: &MemInfo) -> Self {
        Self {
            ins_address: row.ins_address,
            tb_id: row.tb_id,
            size: row.size,
            address: row.address,
            direction: match row.direction {
                MemDirection::Read => 0,
                MemDirection::Write => 1,
            },
            counter: row.counter,
        }
    }
}

#[derive(Clone, Copy, Debug, H5Type)]
#[repr(C)]
pub struct ArmRegisterRow {
    pub r: [u64; 16],
    pub xpsr: u64,
    pub pc: u64,
    pub tb_counter: u64,
}

#[derive(Clone, Copy, Debug, H5Type)]
#[repr(C)]
pub struct RiscVRegisterRow {
    pub x: [u64; 32],
    pub pc: u64,
    pub tb_counter: u64,
}

/// Split a trace's heterogeneous register snapshots into the two
/// architecture-specific row vectors; an experiment only ever populates
/// one of the two, since architecture is a property of the experiment.
pub fn split_registers(snapshots: &[RegisterSnapshot]) -> (Vec<ArmRegisterRow>, Vec<RiscVRegisterRow>) {
    let mut arm = Vec::new();
    let mut riscv = Vec::new();
    for snapshot in snapshots {
        match snapshot {
            RegisterSnapshot::Arm { r, xpsr, pc, tb_counter } => arm.push(ArmRegisterRow {
                r: *r,
                xpsr: *xpsr,
                pc: *pc,
                tb_counter: *tb_counter,
            }),
            RegisterSnapshot::RiscV { x, pc, tb_counter } => riscv.push(RiscVRegisterRow {
                x: *x,
                pc: *pc,
                tb_counter: *tb_counter,
            }),
        }
    }
    (arm, riscv)
}

#[derive(Clone, Debug, H5Type)]
#[repr(C)]
pub struct FaultRow {
    pub address: i64,
    pub kind: u8,
    pub model: u8,
    pub lifespan: u64,
    pub mask_upper: u64,
    pub mask_lower: u64,
    pub num_bytes: u8,
    pub trigger_address: i64,
    pub trigger_hitcounter: u64,
    /// The same identity string [`fault_model::Fault::canonical_string`]
    /// produces, kept verbatim rather than reconstructed from the numeric
    /// columns above, so `--missing-only` resume compares like for like.
    pub canonical: VarLenAscii,
}

impl From<&fault_model::Fault> for FaultRow {
    fn from(fault: &fault_model::Fault) -> Self {
        let address = match fault.fault_address {
            fault_model::FaultAddress::Explicit(address) => address as i64,
            fault_model::FaultAddress::UseTrigger => -1,
            fault_model::FaultAddress::Wildcard(_) => -1,
        };
        let (mask_upper, mask_lower) = fault.mask.as_halves().unwrap_or((0, 0));
        let (trigger_address, trigger_hitcounter) = fault.trigger.to_wire();
        Self {
            address,
            kind: fault.kind as u8,
            model: fault.model as u8,
            lifespan: fault.lifespan,
            mask_upper,
            mask_lower,
            num_bytes: fault.num_bytes,
            trigger_address,
            trigger_hitcounter,
            canonical: VarLenAscii::from_ascii(&fault.canonical_string()).unwrap_or_else(|_| VarLenAscii::from_ascii("").unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experiment_name_zero_pads_to_total_width() {
        assert_eq!(experiment_group_name(7, 1234), "experiment0007");
        assert_eq!(experiment_group_name(7, 9), "experiment7");
    }
}
