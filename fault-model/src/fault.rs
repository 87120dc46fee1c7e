use crate::{error::FaultModelError, mask::Mask, trigger::{Trigger, WildcardRange}};

/// What a fault corrupts. The numeric values are part of the wire format
/// sent to the emulator plugin and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum FaultKind {
    Memory = 0,
    Instruction = 1,
    Register = 2,
}

impl FaultKind {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(FaultKind::Memory),
            1 => Some(FaultKind::Instruction),
            2 => Some(FaultKind::Register),
            _ => None,
        }
    }
}

/// How a fault corrupts the targeted bits. The numeric values are part of
/// the wire format and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum FaultModel {
    Set0 = 0,
    Set1 = 1,
    Toggle = 2,
    Overwrite = 3,
}

impl FaultModel {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(FaultModel::Set0),
            1 => Some(FaultModel::Set1),
            2 => Some(FaultModel::Toggle),
            3 => Some(FaultModel::Overwrite),
            _ => None,
        }
    }
}

/// An inclusive byte-address range, used both for wildcard endpoints and
/// for exclusion filtering during expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressRange {
    pub start: u64,
    pub end: u64,
}

impl AddressRange {
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.start && address <= self.end
    }
}

/// Where a fault applies. Never carries `-1` as an in-band sentinel: the
/// "use the trigger address" and "wildcard" cases are explicit variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FaultAddress {
    /// A concrete byte address.
    Explicit(u64),
    /// Resolved to whatever address the trigger itself resolves to.
    UseTrigger,
    /// A range to be expanded into one concrete fault per covered
    /// instruction once a golden run is available.
    Wildcard(WildcardRange),
}

impl FaultAddress {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, FaultAddress::Wildcard(_))
    }

    /// The concrete address, if this isn't a wildcard or a
    /// use-the-trigger-address sentinel.
    pub fn explicit(&self) -> Option<u64> {
        match self {
            FaultAddress::Explicit(address) => Some(*address),
            _ => None,
        }
    }
}

/// A single fault: one bit-flip (or instruction overwrite) applied at one
/// trigger point. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fault {
    pub fault_address: FaultAddress,
    pub fault_address_exclude: Vec<AddressRange>,
    pub kind: FaultKind,
    pub model: FaultModel,
    /// Number of executed instructions the fault persists for after the
    /// trigger fires; `0` means permanent. Only meaningful for
    /// memory/register faults.
    pub lifespan: u64,
    pub mask: Mask,
    /// Size in bytes for the instruction-overwrite model; `0` for bit
    /// models.
    pub num_bytes: u8,
    pub trigger: Trigger,
}

impl Fault {
    /// Construct a fault, enforcing the invariant that a byte-sequence mask
    /// only appears for `kind=instruction, model=overwrite, num_bytes=0`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fault_address: FaultAddress,
        fault_address_exclude: Vec<AddressRange>,
        kind: FaultKind,
        model: FaultModel,
        lifespan: u64,
        mask: Mask,
        num_bytes: u8,
        trigger: Trigger,
    ) -> Result<Self, FaultModelError> {
        if matches!(mask, Mask::Bytes(_))
            && !(kind == FaultKind::Instruction && model == FaultModel::Overwrite && num_bytes == 0)
        {
            return Err(FaultModelError::InvalidByteMaskUsage {
                kind,
                model,
                num_bytes,
            });
        }
        Ok(Self {
            fault_address,
            fault_address_exclude,
            kind,
            model,
            lifespan,
            mask,
            num_bytes,
            trigger,
        })
    }

    /// `true` if `address` falls inside any of this fault's exclusion
    /// ranges. Only meaningful for concrete (non-wildcard) addresses.
    pub fn excludes(&self, address: u64) -> bool {
        self.fault_address_exclude
            .iter()
            .any(|range| range.contains(address))
    }

    /// The canonical string identity of this fault: every field, in a fixed
    /// order, joined with `|`. Two faults are equivalent for resume
    /// purposes iff their canonical strings match — no other equality is
    /// used for that purpose.
    pub fn canonical_string(&self) -> String {
        let address = match self.fault_address {
            FaultAddress::Explicit(address) => format!("addr:{address:#x}"),
            FaultAddress::UseTrigger => "addr:use-trigger".to_string(),
            FaultAddress::Wildcard(range) => format!(
                "addr:wildcard:{:#x}/{}-{:#x}/{}:{}",
                range.start.address,
                range.start.hitcounter,
                range.end.address,
                range.end.hitcounter,
                range.local
            ),
        };
        let mask = match &self.mask {
            Mask::U128(value) => format!("mask:{value:#034x}"),
            Mask::Bytes(bytes) => format!("mask:bytes:{}", hex_of(bytes)),
        };
        let (trigger_address, trigger_hitcounter) = self.trigger.to_wire();
        format!(
            "{address}|kind:{:?}|model:{:?}|lifespan:{}|{mask}|num_bytes:{}|trigger:{}/{}",
            self.kind, self.model, self.lifespan, self.num_bytes, trigger_address, trigger_hitcounter,
        )
    }
}

fn hex_of(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A set of faults applied together in a single experiment, in the order
/// listed. `index` is the archive-facing experiment number.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FaultCombination {
    pub index: u64,
    pub faults: Vec<Fault>,
}

impl FaultCombination {
    /// Panics if `faults` is empty: a combination always contains at least
    /// one fault.
    pub fn new(index: u64, faults: Vec<Fault>) -> Self {
        assert!(!faults.is_empty(), "a FaultCombination needs at least one fault");
        Self { index, faults }
    }

    pub fn canonical_string(&self) -> String {
        self.faults
            .iter()
            .map(Fault::canonical_string)
            .collect::<Vec<_>>()
            .join(";")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fault(address: u64) -> Fault {
        Fault::new(
            FaultAddress::Explicit(address),
            vec![],
            FaultKind::Memory,
            FaultModel::Set1,
            10,
            Mask::U128(4),
            0,
            Trigger::Absolute {
                address: 0x8000_0c2,
                hitcounter: 1,
            },
        )
        .unwrap()
    }

    #[test]
    fn canonical_string_is_stable_and_field_sensitive() {
        let a = sample_fault(0x8000_00c0);
        let b = sample_fault(0x8000_00c0);
        assert_eq!(a.canonical_string(), b.canonical_string());

        let c = sample_fault(0x8000_00c4);
        assert_ne!(a.canonical_string(), c.canonical_string());
    }

    #[test]
    fn byte_mask_rejected_outside_instruction_overwrite() {
        let err = Fault::new(
            FaultAddress::Explicit(0x1000),
            vec![],
            FaultKind::Memory,
            FaultModel::Set1,
            0,
            Mask::Bytes(vec![0xaa, 0xbb]),
            0,
            Trigger::Absolute {
                address: 0x1000,
                hitcounter: 1,
            },
        )
        .unwrap_err();
        assert!(matches!(err, FaultModelError::InvalidByteMaskUsage { .. }));
    }

    #[test]
    fn byte_mask_accepted_for_instruction_overwrite() {
        let fault = Fault::new(
            FaultAddress::Explicit(0x1000),
            vec![],
            FaultKind::Instruction,
            FaultModel::Overwrite,
            0,
            Mask::Bytes(vec![0x00, 0x00]),
            0,
            Trigger::Absolute {
                address: 0x1000,
                hitcounter: 1,
            },
        );
        assert!(fault.is_ok());
    }

    #[test]
    fn exclusion_range_filters_concrete_address() {
        let fault = sample_fault(0x8000_0008);
        let mut fault = fault;
        fault.fault_address_exclude = vec![AddressRange::new(0x8000_0008, 0x8000_0008)];
        assert!(fault.excludes(0x8000_0008));
        assert!(!fault.excludes(0x8000_000c));
    }
}
