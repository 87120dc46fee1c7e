/// Errors raised while reading system resource state the scheduler needs
/// to make submission decisions.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse total system RAM out of /proc/meminfo")]
    MemInfoUnparseable,
}
