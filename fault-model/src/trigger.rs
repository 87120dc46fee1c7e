/// The instruction whose execution arms a [`crate::Fault`].
///
/// `trigger_address` in the wire format (see the `qemu-ipc` crate) is a
/// signed 64-bit value: negative values are relative offsets resolved
/// against a golden run, positive values are already-concrete addresses.
/// `Unresolved` is the explicit stand-in for that same wire value of `-1`
/// once resolution has run and failed, or after a lifespan came up short
/// (the trigger is disarmed but the fault stays in the campaign).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Trigger {
    /// A concrete trigger instruction address and the occurrence count
    /// (1-based) that must be reached before the fault fires.
    Absolute { address: u64, hitcounter: u64 },
    /// An offset (in instructions, towards the start of execution) from a
    /// fault address, to be resolved against a golden-run trace.
    RelativeOffset { offset: i64, hitcounter: u64 },
    /// Resolution failed, or the fault's trigger was disarmed because its
    /// lifespan would have expired before it could fire.
    Unresolved,
}

impl Trigger {
    /// Build a trigger from the raw `(trigger_address, trigger_hitcounter)`
    /// pair as it appears in a fault configuration document.
    pub fn from_raw(trigger_address: i64, trigger_hitcounter: u64) -> Self {
        if trigger_address < 0 {
            Trigger::RelativeOffset {
                offset: trigger_address,
                hitcounter: trigger_hitcounter,
            }
        } else {
            Trigger::Absolute {
                address: trigger_address as u64,
                hitcounter: trigger_hitcounter,
            }
        }
    }

    /// The `(address, hitcounter)` pair as transmitted to the emulator.
    /// `Unresolved` is encoded as `(-1, 0)`, matching the original sentinel.
    pub fn to_wire(self) -> (i64, u64) {
        match self {
            Trigger::Absolute { address, hitcounter } => (address as i64, hitcounter),
            Trigger::RelativeOffset { offset, hitcounter } => (offset, hitcounter),
            Trigger::Unresolved => (-1, 0),
        }
    }

    pub fn is_relative(&self) -> bool {
        matches!(self, Trigger::RelativeOffset { .. })
    }

    pub fn hitcounter(&self) -> u64 {
        match self {
            Trigger::Absolute { hitcounter, .. } => *hitcounter,
            Trigger::RelativeOffset { hitcounter, .. } => *hitcounter,
            Trigger::Unresolved => 0,
        }
    }
}

/// A concrete `(address, hitcounter)` pair, used for the endpoints of a
/// wildcard fault's address range. Unlike [`Trigger`] both sides are always
/// absolute addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddrHit {
    pub address: u64,
    pub hitcounter: u64,
}

impl AddrHit {
    pub const fn new(address: u64, hitcounter: u64) -> Self {
        Self { address, hitcounter }
    }
}

/// A wildcard fault's address range, expanded into one [`crate::Fault`] per
/// covered instruction once a golden run is available (see `golden-run`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WildcardRange {
    pub start: AddrHit,
    pub end: AddrHit,
    /// A local wildcard re-arms every time `start` is seen again, rather
    /// than firing once between `start` and `end`.
    pub local: bool,
}

impl WildcardRange {
    /// A lone `"*"` with no explicit start/end: active for the whole trace.
    pub fn open() -> Self {
        Self {
            start: AddrHit::default(),
            end: AddrHit::default(),
            local: false,
        }
    }
}
