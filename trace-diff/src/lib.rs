//! Post-processes one experiment's raw trace: removes JIT single-step
//! artefact translation blocks, then diffs the result against the golden
//! run so only rows unique to the experiment are persisted.

mod convert;
mod diff;
mod filter;
mod types;

pub use diff::unique_to_self;
pub use filter::{instruction_addresses, filter_artefacts, reverse_ring_buffer};
pub use types::{row_hash, MemDirection, MemInfo, RegisterSnapshot, TbExec, TbInfo, Trace};
