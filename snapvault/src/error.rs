/// Errors that end a run (or prevent it from starting).
///
/// Per-file problems never surface here: unreadable directory entries are logged and skipped,
/// and failed copies are collected as [`crate::TransferFailure`]s.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no destinations configured")]
    NoDestinations,
    #[error("source directory {path:?} is not readable")]
    SourceUnreadable {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed connecting to destination {destination} ({target})")]
    Connect {
        destination: String,
        target: String,
        #[source]
        source: remote::Error,
    },
    #[error("transfer cancelled")]
    Cancelled,
    #[error("all transfer workers exited before discovery finished")]
    WorkersGone,
    #[error("failed reading configuration from {path:?}")]
    ConfigRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed parsing configuration")]
    ConfigParse(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// The message followed by every underlying cause: `outer: inner: root`.
    #[must_use]
    pub fn display_chain(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}
