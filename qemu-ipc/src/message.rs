//! The three message schemas exchanged with the emulator plugin over the
//! control/config/data FIFOs.

use fault_model::{Fault, FaultAddress, Mask};
use serde::{Deserialize, Serialize};

/// An instrumentation end-point: stop the run once `address` has executed
/// `counter` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndPoint {
    pub address: u64,
    pub counter: u64,
}

/// A memory region to dump on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDumpRequest {
    pub address: u64,
    pub length: u64,
}

/// Controller -> emulator, sent once at worker start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub max_duration: u64,
    pub num_faults: u32,
    pub tb_exec_list: bool,
    pub tb_info: bool,
    pub mem_info: bool,
    pub start_address: Option<EndPoint>,
    pub end_points: Vec<EndPoint>,
    pub tb_exec_list_ring_buffer: bool,
    pub full_mem_dump: bool,
    pub memorydumps: Vec<MemoryDumpRequest>,
}

/// One fault entry as it appears on the wire: the 128-bit mask is always
/// split into two 64-bit halves, and a byte-sequence mask is carried
/// separately so the plugin can tell the two encodings apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFault {
    pub address: i64,
    pub address_is_wildcard: bool,
    pub kind: u8,
    pub model: u8,
    pub lifespan: u64,
    pub mask_upper: u64,
    pub mask_lower: u64,
    pub mask_bytes: Vec<u8>,
    pub num_bytes: u8,
    pub trigger_address: i64,
    pub trigger_hitcounter: u64,
}

impl WireFault {
    pub fn from_fault(fault: &Fault) -> Self {
        let address = match fault.fault_address {
            FaultAddress::Explicit(address) => address as i64,
            FaultAddress::UseTrigger => -1,
            FaultAddress::Wildcard(_) => -1,
        };
        let (mask_upper, mask_lower, mask_bytes) = match &fault.mask {
            Mask::U128(value) => {
                let (upper, lower) = Mask::U128(*value).as_halves().unwrap_or((0, 0));
                (upper, lower, Vec::new())
            }
            Mask::Bytes(bytes) => (0, 0, bytes.clone()),
        };
        let (trigger_address, trigger_hitcounter) = fault.trigger.to_wire();
        Self {
            address,
            address_is_wildcard: fault.fault_address.is_wildcard(),
            kind: fault.kind as u8,
            model: fault.model as u8,
            lifespan: fault.lifespan,
            mask_upper,
            mask_lower,
            mask_bytes,
            num_bytes: fault.num_bytes,
            trigger_address,
            trigger_hitcounter,
        }
    }
}

/// Controller -> emulator, sent once immediately after [`Control`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FaultPack {
    pub faults: Vec<WireFault>,
}

impl FaultPack {
    pub fn from_faults(faults: &[Fault]) -> Self {
        Self {
            faults: faults.iter().map(WireFault::from_fault).collect(),
        }
    }
}

/// A translation block as reported by the emulator plugin. `assembler`
/// carries bracketed per-instruction addresses (`"[ 0x80001a2 ] ..."`),
/// which `trace-diff` parses out to build its artefact filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TbInformation {
    pub id: u64,
    pub size: u64,
    pub ins_count: u64,
    pub num_exec: u64,
    pub assembler: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TbExecOrder {
    pub tb: u64,
    pub pos: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemInfoEntry {
    pub ins_address: u64,
    pub tb_id: u64,
    pub size: u32,
    pub address: u64,
    /// `0` = read, `1` = write.
    pub direction: u8,
    pub counter: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemDumpInfo {
    pub address: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterInfo {
    pub arch_type: String,
    pub register_dumps: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultedData {
    pub fault_index: u32,
    pub effective_address: u64,
    pub applied: bool,
}

/// Emulator -> controller, sent once on completion. Every field is
/// optional/empty-able rather than required: a worker that crashed
/// mid-run still produces a partial, well-formed `Data` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    pub end_point: Option<EndPoint>,
    pub end_reason: Option<String>,
    pub tb_informations: Vec<TbInformation>,
    pub tb_exec_orders: Vec<TbExecOrder>,
    pub mem_infos: Vec<MemInfoEntry>,
    pub mem_dump_infos: Vec<MemDumpInfo>,
    pub register_info: Option<RegisterInfo>,
    pub faulted_datas: Vec<FaultedData>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fault_model::{Fault, FaultAddress, FaultKind, FaultModel, Mask, Trigger};

    #[test]
    fn wire_fault_splits_mask_into_halves() {
        let fault = Fault::new(
            FaultAddress::Explicit(0x1000),
            vec![],
            FaultKind::Memory,
            FaultModel::Set1,
            0,
            Mask::from_halves(0xdead_beef, 0xcafe_babe),
            0,
            Trigger::Absolute {
                address: 0x1000,
                hitcounter: 1,
            },
        )
        .unwrap();
        let wire = WireFault::from_fault(&fault);
        assert_eq!(wire.mask_upper, 0xdead_beef);
        assert_eq!(wire.mask_lower, 0xcafe_babe);
        assert!(wire.mask_bytes.is_empty());
    }

    #[test]
    fn use_trigger_address_is_minus_one_on_wire() {
        let fault = Fault::new(
            FaultAddress::UseTrigger,
            vec![],
            FaultKind::Register,
            FaultModel::Toggle,
            0,
            Mask::U128(1),
            0,
            Trigger::Absolute {
                address: 0x2000,
                hitcounter: 2,
            },
        )
        .unwrap();
        assert_eq!(WireFault::from_fault(&fault).address, -1);
    }
}
