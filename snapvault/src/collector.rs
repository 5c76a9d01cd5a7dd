/// A file that could not be copied to one destination.
#[derive(Debug)]
pub struct TransferFailure {
    pub source_path: std::path::PathBuf,
    pub destination: String,
    pub cause: anyhow::Error,
}

impl std::fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} -> {}: {:#}",
            self.source_path, self.destination, self.cause
        )
    }
}

/// Spawn the task gathering failures from all workers.
///
/// The task ends, returning everything it received, once every sender is dropped.
pub(crate) fn spawn(
    capacity: usize,
) -> (
    tokio::sync::mpsc::Sender<TransferFailure>,
    tokio::task::JoinHandle<Vec<TransferFailure>>,
) {
    let (sender, mut receiver) = tokio::sync::mpsc::channel(capacity.max(1));
    let collector = tokio::spawn(async move {
        let mut failures = Vec::new();
        while let Some(failure) = receiver.recv().await {
            failures.push(failure);
        }
        failures
    });
    (sender, collector)
}
