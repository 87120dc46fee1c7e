/// Errors that can occur while constructing a [`crate::Fault`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FaultModelError {
    /// An opaque byte-sequence mask was used outside of the one combination
    /// the data model allows: instruction + overwrite + `num_bytes == 0`.
    #[error(
        "byte-sequence masks are only valid for kind=instruction, model=overwrite, num_bytes=0 \
         (got kind={kind:?}, model={model:?}, num_bytes={num_bytes})"
    )]
    InvalidByteMaskUsage {
        kind: crate::FaultKind,
        model: crate::FaultModel,
        num_bytes: u8,
    },
}
