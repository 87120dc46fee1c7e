/// Errors raised while expanding a declarative fault-device description
/// into concrete [`fault_model::Fault`]s.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExpansionError {
    /// A range list had zero, or more than three, elements, or a `shift`
    /// object's `range` field wasn't exactly three elements.
    #[error("invalid range spec in {context}: {detail}")]
    InvalidRangeSpec { context: String, detail: String },

    /// The legacy `fault_livespan` key was present in a fault device
    /// description. It must not be silently accepted.
    #[error("unknown fault configuration property 'fault_livespan'; did you mean 'fault_lifespan'?")]
    ObsoleteField,

    /// A required field was missing from a fault device description.
    #[error("fault device is missing required field '{field}'")]
    MissingField { field: String },

    /// `fault_type` or `fault_model` didn't match any known keyword.
    #[error("unrecognized {field} '{value}'")]
    UnrecognizedKeyword { field: String, value: String },

    /// A numeric range element could not be parsed (wrong JSON shape, or a
    /// string that isn't a valid `addr` / `addr/hit` token).
    #[error("could not parse numeric value '{value}': {reason}")]
    BadNumericValue { value: String, reason: String },

    #[error(transparent)]
    FaultModel(#[from] fault_model::FaultModelError),
}
