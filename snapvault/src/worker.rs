use tracing::instrument;

use crate::collector::TransferFailure;
use crate::destination::Destination;
use crate::job::TransferJob;

/// Takes jobs off the queue and copies each one to every destination, in order.
///
/// A failed copy is reported and the worker moves on to the next destination; nothing a single
/// file does stops a worker. Workers exit when the queue is closed and drained, or when the run is
/// cancelled (abandoning whatever is still queued).
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) jobs: async_channel::Receiver<TransferJob>,
    pub(crate) destinations: std::sync::Arc<Vec<Destination>>,
    pub(crate) failures: tokio::sync::mpsc::Sender<TransferFailure>,
    pub(crate) progress: std::sync::Arc<common::progress::Progress>,
    pub(crate) cancel: tokio_util::sync::CancellationToken,
}

impl Worker {
    #[instrument(skip(self), fields(worker = self.id))]
    pub(crate) async fn run(self) {
        loop {
            let job = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!("cancelled, exiting");
                    break;
                }
                job = self.jobs.recv() => match job {
                    Ok(job) => job,
                    Err(_) => {
                        tracing::debug!("queue closed, exiting");
                        break;
                    }
                },
            };
            self.process(&job).await;
            self.progress.jobs_finished.inc();
        }
    }

    async fn process(&self, job: &TransferJob) {
        for destination in self.destinations.iter() {
            if self.cancel.is_cancelled() {
                tracing::debug!(
                    "cancelled, skipping remaining destinations for {:?}",
                    job.source_path
                );
                return;
            }
            match destination
                .transfer(self.id, job, &self.progress, &self.cancel)
                .await
            {
                Ok(None) => return,
                Ok(Some(bytes)) => {
                    self.progress.copies_completed.inc();
                    self.progress.bytes_copied.add(bytes);
                    tracing::info!("copied {:?} to {}", job.source_path, destination.id());
                }
                Err(cause) => {
                    self.progress.copies_failed.inc();
                    tracing::error!(
                        "failed copying {:?} to {}: {:#}",
                        job.source_path,
                        destination.id(),
                        cause
                    );
                    let failure = TransferFailure {
                        source_path: job.source_path.clone(),
                        destination: destination.id().to_string(),
                        cause,
                    };
                    if self.failures.send(failure).await.is_err() {
                        tracing::error!("failure collector is gone, dropping failure report");
                    }
                }
            }
        }
    }
}
