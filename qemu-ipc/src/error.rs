/// Errors raised by the named-pipe wire protocol and emulator process
/// lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create fifo {path}: {source}")]
    Mkfifo {
        path: String,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("malformed frame length prefix: {0:?}")]
    BadFrameLength(String),

    #[error("frame exceeds maximum size ({0} bytes)")]
    FrameTooLarge(usize),

    #[error("failed to encode message: {0}")]
    Encode(#[from] Box<bincode::ErrorKind>),

    #[error("failed to spawn emulator process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("emulator process exited with status {0}")]
    EmulatorExit(std::process::ExitStatus),
}
