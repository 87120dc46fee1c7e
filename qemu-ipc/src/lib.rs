//! Talks to one emulator worker process over three named pipes: a
//! length-prefixed binary framing layer, the Control/FaultPack/Data message
//! schemas, FIFO lifecycle management, and emulator process spawning.

mod error;
mod fifo;
mod message;
mod process;
mod wire;
mod worker;

pub use error::IpcError;
pub use fifo::WorkerFifos;
pub use message::{
    Control, Data, EndPoint, FaultPack, FaultedData, MemDumpInfo, MemInfoEntry, MemoryDumpRequest,
    RegisterInfo, TbExecOrder, TbInformation, WireFault,
};
pub use process::{kill, plugin_path_exists, EmulatorLaunch};
pub use wire::{read_frame, read_message, write_frame, write_message};
pub use worker::run_experiment;
