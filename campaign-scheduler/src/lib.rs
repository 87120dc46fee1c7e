//! Memory- and queue-aware worker pool: one OS thread per experiment,
//! gated by the same adaptive memory estimate the original tooling used
//! to avoid oversubscribing host RAM across many concurrent emulator
//! instances.

mod error;
mod mem;
mod queue;
mod scheduler;
mod stats;

pub use error::SchedulerError;
pub use mem::{max_ram, mem_estimate, system_ram_bytes};
pub use queue::{bounded_channel, BoundedReceiver, BoundedSender};
pub use scheduler::{RamSample, Scheduler, SchedulerConfig};
pub use stats::{DurationWindow, RssWindow};
