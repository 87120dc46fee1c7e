/// Errors and non-fatal conditions raised while resolving a relative
/// trigger offset against a golden-run trace.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TriggerResolveError {
    /// `requested_hitcounter` exceeds the number of times `fault_address`
    /// actually executed in the golden run. The trigger resolves to
    /// `fault_model::Trigger::Unresolved`, not a hard error.
    #[error("fault address {fault_address:#x} executed fewer than {requested_hitcounter} times")]
    NotFound {
        fault_address: u64,
        requested_hitcounter: u64,
    },

    /// `trigger_offset + lifespan < 0`: the fault's lifespan would expire
    /// before the trigger instruction it's relative to could fire. A
    /// warning, not a campaign-ending error — the fault stays in the
    /// campaign with its trigger disarmed.
    #[error("lifespan {lifespan} is too short for trigger offset {trigger_offset}")]
    LifespanNegative { trigger_offset: i64, lifespan: u64 },

    /// The hit-counter accumulator overflowed `u64`. Should never happen
    /// for any real trace; guarded with a checked add rather than assumed
    /// impossible.
    #[error("hit-counter overflowed while resolving trigger for {0:#x}")]
    HitcounterOverflow(u64),
}
