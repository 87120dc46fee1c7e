//! Runs the pre-golden and golden reference experiments, expands wildcard
//! fault addresses against the resulting trace, resolves every relative
//! trigger, drops faults whose trigger never executed, and computes the
//! campaign-wide instruction budget.

mod calculate;
mod driver;
mod error;
mod wildcard;

pub use calculate::{
    calculate_trigger_addresses, checktriggers_in_tb, max_instruction_count,
    resolve_use_trigger_addresses,
};
pub use driver::{GoldenRunConfig, GoldenRunDriver};
pub use error::GoldenRunError;
pub use wildcard::generate_wildcard_faults;
