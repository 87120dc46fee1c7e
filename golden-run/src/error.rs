/// Errors raised while driving the pre-golden and golden reference runs.
#[derive(Debug, thiserror::Error)]
pub enum GoldenRunError {
    /// The golden run's `end_reason` was `"max tb"`: it ran out of
    /// translation blocks before reaching its configured end point. The
    /// whole campaign aborts — a golden run that can't terminate means no
    /// fault experiment can be trusted either.
    #[error("golden run aborted: reached max tb before its end point")]
    MaxTbAbort,

    #[error(transparent)]
    Ipc(#[from] qemu_ipc::IpcError),
}
