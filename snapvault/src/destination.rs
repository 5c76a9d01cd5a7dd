use anyhow::Context;
use tracing::instrument;

use crate::config::DestinationConfig;
use crate::directory_cache::DirectoryCache;
use crate::job::TransferJob;
use crate::Error;

/// A connected destination: one connection per worker plus the shared directory cache.
pub struct Destination {
    id: String,
    base_path: String,
    connections: Vec<remote::Connection>,
    directories: DirectoryCache,
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Destination")
            .field("id", &self.id)
            .field("base_path", &self.base_path)
            .field("connections", &self.connections.len())
            .finish()
    }
}

impl Destination {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    #[must_use]
    pub fn directories(&self) -> &DirectoryCache {
        &self.directories
    }

    fn connection(&self, worker_id: usize) -> &remote::Connection {
        &self.connections[worker_id % self.connections.len()]
    }

    /// Copy the job's file to this destination, creating its directories first.
    ///
    /// Returns the number of bytes written, or `None` when the run was cancelled before the copy
    /// started.
    #[instrument(
        skip(self, job, progress, cancel),
        fields(destination = %self.id, file = ?job.source_path)
    )]
    pub(crate) async fn transfer(
        &self,
        worker_id: usize,
        job: &TransferJob,
        progress: &common::progress::Progress,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> anyhow::Result<Option<u64>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let connection = self.connection(worker_id);
        let dir = job.remote_dir(&self.base_path);
        let created = self
            .directories
            .ensure(connection.share(), &dir, cancel)
            .await
            .with_context(|| format!("failed creating directory {dir:?}"))?;
        progress.directories_created.add(created);
        let path = remote::path::join(&[dir.as_str(), job.remote_name.as_str()]);
        let mut source = tokio::fs::File::open(&job.source_path)
            .await
            .with_context(|| format!("failed opening {:?}", job.source_path))?;
        if cancel.is_cancelled() {
            tracing::debug!("cancelled, not copying {:?}", job.source_path);
            return Ok(None);
        }
        tracing::debug!("copying {:?} to {}:{}", job.source_path, self.id, path);
        let written = connection
            .share()
            .create_and_write(&path, &mut source)
            .await
            .with_context(|| format!("failed writing {path:?}"))?;
        Ok(Some(written))
    }

    pub(crate) async fn close(&self) {
        for connection in &self.connections {
            connection.close().await;
        }
    }
}

/// Open `sessions` connections to every destination, in configuration order.
///
/// Any failure (or cancellation) closes what was opened so far and fails the whole call: a run
/// never starts with a partial set of destinations.
#[instrument(skip(connector, configs, cancel))]
pub(crate) async fn connect_all(
    connector: &dyn remote::Connector,
    configs: &[DestinationConfig],
    sessions: usize,
    timeout: std::time::Duration,
    cancel: &tokio_util::sync::CancellationToken,
) -> Result<Vec<Destination>, Error> {
    let mut destinations: Vec<Destination> = Vec::with_capacity(configs.len());
    for config in configs {
        let target = config.target();
        tracing::info!(
            "connecting to destination {} ({}, {} sessions)",
            config.id(),
            target.address(),
            sessions
        );
        let mut destination = Destination {
            id: config.id(),
            base_path: config.base_path.clone(),
            connections: Vec::with_capacity(sessions),
            directories: DirectoryCache::new(),
        };
        let mut failure = None;
        for _ in 0..sessions.max(1) {
            let opened = remote::Connection::open(connector, &target, timeout, cancel).await;
            let opened = match opened {
                Err(remote::Error::Cancelled) => Err(Error::Cancelled),
                opened => opened.map_err(|source| Error::Connect {
                    destination: config.id(),
                    target: target.to_string(),
                    source,
                }),
            };
            match opened {
                Ok(connection) => destination.connections.push(connection),
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }
        if let Some(error) = failure {
            destination.close().await;
            close_all(&destinations).await;
            return Err(error);
        }
        destinations.push(destination);
    }
    Ok(destinations)
}

pub(crate) async fn close_all(destinations: &[Destination]) {
    for destination in destinations {
        tracing::debug!("closing destination {}", destination.id);
        destination.close().await;
    }
}
