/// The bit pattern a fault affects.
///
/// Most models address individual bits of a 128-bit pattern. The
/// instruction-overwrite model can instead carry an opaque replacement byte
/// sequence; [`crate::Fault::new`] enforces that this form only appears
/// together with `kind == Instruction`, `model == Overwrite` and
/// `num_bytes == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mask {
    U128(u128),
    Bytes(Vec<u8>),
}

impl Mask {
    /// Split a `U128` mask into its `(upper, lower)` 64-bit halves for the
    /// wire format. Returns `None` for a `Bytes` mask (callers send the raw
    /// bytes through a different field in that case).
    pub fn as_halves(&self) -> Option<(u64, u64)> {
        match self {
            Mask::U128(value) => {
                let upper = (value >> 64) as u64;
                let lower = (value & u128::from(u64::MAX)) as u64;
                Some((upper, lower))
            }
            Mask::Bytes(_) => None,
        }
    }

    pub fn from_halves(upper: u64, lower: u64) -> Self {
        Mask::U128((u128::from(upper) << 64) | u128::from(lower))
    }
}

impl Default for Mask {
    fn default() -> Self {
        Mask::U128(0)
    }
}
