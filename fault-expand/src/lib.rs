//! Expands the declarative fault-device descriptions in a fault
//! configuration document into concrete [`fault_model::FaultCombination`]s:
//! integer/list/shift range grammars, address-exclusion filtering, and
//! deferred wildcard faults that [`golden-run`](../golden_run/index.html)
//! expands once a trace is available.

mod error;
mod expand;
mod range;

pub use error::ExpansionError;
pub use expand::{combine_devices, expand_device, flatten_combinations, FaultDeviceConfig};
pub use range::{is_wildcard, parse_auto_base, parse_mask_range, parse_numeric_range, parse_wildcard, MaskValue};
