//! The trace-shaped record types every post-processing stage operates on.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A translation block as reported by the emulator. `assembler` carries
/// bracketed per-instruction addresses (`"[ 0x80001a2 ] ..."`), which
/// [`crate::filter::instruction_addresses`] parses into the per-TB filter
/// used by both artefact filtering and trigger resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TbInfo {
    pub id: u64,
    pub size: u64,
    pub ins_count: u64,
    pub num_exec: u64,
    pub assembler: String,
}

/// One entry in the sequential execution order. `pos` is renumbered
/// contiguously from 0 after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TbExec {
    pub tb: u64,
    pub pos: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemDirection {
    Read = 0,
    Write = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemInfo {
    pub ins_address: u64,
    pub tb_id: u64,
    pub size: u32,
    pub address: u64,
    pub direction: MemDirection,
    pub counter: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegisterSnapshot {
    Arm {
        r: [u64; 16],
        xpsr: u64,
        pc: u64,
        tb_counter: u64,
    },
    RiscV {
        x: [u64; 32],
        pc: u64,
        tb_counter: u64,
    },
}

/// A trace as produced by one experiment, before or after artefact
/// filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    pub tbinfo: Vec<TbInfo>,
    pub tbexec: Vec<TbExec>,
    pub meminfo: Vec<MemInfo>,
    pub registers: Vec<RegisterSnapshot>,
}

/// A stable hash of a row, used as the key of the multiset diff in
/// [`crate::diff`]. Two rows with the same fields hash identically
/// regardless of which trace they came from.
pub fn row_hash<T: Hash>(row: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    row.hash(&mut hasher);
    hasher.finish()
}
