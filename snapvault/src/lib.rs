//! Concurrent photo transfer to several network shares
//!
//! `snapvault` copies every photo under a source directory (typically a memory card) to each
//! configured destination, filing it under
//! `<base_path>/<year> - <name>/<YYYY-MM-DD>/<file name>` by capture date.
//!
//! # Pipeline
//!
//! A run is made of four cooperating parts:
//!
//! - **discovery** walks the source tree and pushes one [`TransferJob`] per photo into a bounded
//!   queue; a full queue pauses the walk until workers catch up
//! - **workers** (a fixed pool) pull jobs and copy each file to every destination in turn, using
//!   their own connection to each destination
//! - each **destination** keeps a cache of directories it already created, shared by its workers,
//!   so a date folder costs one `mkdir` per destination rather than one per file
//! - the **collector** gathers per-file failures; a failed copy never stops the run
//!
//! Connections to all destinations are opened before discovery starts. If any destination is
//! unreachable the run fails without copying anything, and connections are always released before
//! [`Pipeline::run`] returns.
//!
//! # Cancellation
//!
//! Cancelling the token passed to [`Pipeline::run`] stops discovery (even while it is blocked on a
//! full queue), makes workers exit after the copy they are doing, and yields a result whose
//! [`Status`] is [`Status::Cancelled`]. Files already written stay in place; copies in progress
//! may leave partial files behind.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), snapvault::Error> {
//! let config = snapvault::Config::load(std::path::Path::new("config.yaml")).await?;
//! let pipeline = snapvault::Pipeline::new(std::sync::Arc::new(remote::mounted::MountedConnector::new()));
//! let result = pipeline
//!     .run(
//!         std::path::Path::new("/media/card"),
//!         "2025 - Wedding",
//!         &config.destinations,
//!         &snapvault::Settings::default(),
//!         &tokio_util::sync::CancellationToken::new(),
//!     )
//!     .await?;
//! println!("{}", result.summary);
//! # Ok(())
//! # }
//! ```

use tracing::instrument;

pub mod collector;
pub mod config;
pub mod destination;
pub mod directory_cache;
pub mod discovery;
pub mod error;
pub mod interrupt;
pub mod job;
pub mod notify;
pub mod summary;
pub mod timestamp;
mod worker;

pub use collector::TransferFailure;
pub use config::{Config, DestinationConfig};
pub use discovery::Extensions;
pub use error::Error;
pub use job::{TransferJob, organizing_folder_name};
pub use summary::{RunResult, Status, Summary};

/// Tuning knobs of a run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Number of transfer workers; each opens its own connection to every destination
    pub workers: usize,
    /// Jobs that may wait in the queue before discovery blocks
    pub queue_capacity: usize,
    /// Limit for establishing each connection
    pub connect_timeout: std::time::Duration,
    pub extensions: Extensions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 4,
            connect_timeout: std::time::Duration::from_secs(30),
            extensions: Extensions::photos(),
        }
    }
}

async fn check_source(root: &std::path::Path) -> Result<(), Error> {
    match tokio::fs::metadata(root).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(Error::SourceUnreadable {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
        }),
        Err(source) => Err(Error::SourceUnreadable {
            path: root.to_path_buf(),
            source,
        }),
    }
}

/// Runs transfers against the destinations reachable through one connector.
///
/// Counters accumulate in [`Pipeline::progress`]; use a new pipeline per run.
pub struct Pipeline {
    connector: std::sync::Arc<dyn remote::Connector>,
    extractor: std::sync::Arc<dyn timestamp::Extractor>,
    progress: std::sync::Arc<common::progress::Progress>,
}

impl Pipeline {
    #[must_use]
    pub fn new(connector: std::sync::Arc<dyn remote::Connector>) -> Self {
        Self {
            connector,
            extractor: std::sync::Arc::new(timestamp::ExifExtractor),
            progress: std::sync::Arc::new(common::progress::Progress::new()),
        }
    }

    /// Use `extractor` instead of reading EXIF data.
    #[must_use]
    pub fn with_extractor(mut self, extractor: std::sync::Arc<dyn timestamp::Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub fn progress(&self) -> &std::sync::Arc<common::progress::Progress> {
        &self.progress
    }

    /// Copy every photo under `source_root` to all `destinations`, inside `organizing_folder`.
    ///
    /// Returns an error when the run cannot start: no destinations, unreadable source, a
    /// destination that cannot be connected, or cancellation while connecting. Once transfers
    /// started, the outcome (including cancellation) is reported through [`RunResult`].
    #[instrument(skip(self, destinations, settings, cancel))]
    pub async fn run(
        &self,
        source_root: &std::path::Path,
        organizing_folder: &str,
        destinations: &[DestinationConfig],
        settings: &Settings,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<RunResult, Error> {
        let start = std::time::Instant::now();
        if destinations.is_empty() {
            return Err(Error::NoDestinations);
        }
        check_source(source_root).await?;
        let workers = settings.workers.max(1);
        let connected = std::sync::Arc::new(
            destination::connect_all(
                self.connector.as_ref(),
                destinations,
                workers,
                settings.connect_timeout,
                cancel,
            )
            .await?,
        );
        tracing::info!(
            "connected to {} destinations, starting {} workers",
            connected.len(),
            workers
        );
        let mut result = self
            .transfer(
                source_root,
                organizing_folder,
                &connected,
                workers,
                settings,
                cancel,
            )
            .await;
        destination::close_all(&connected).await;
        result.summary.duration = start.elapsed();
        Ok(result)
    }

    async fn transfer(
        &self,
        source_root: &std::path::Path,
        organizing_folder: &str,
        destinations: &std::sync::Arc<Vec<destination::Destination>>,
        workers: usize,
        settings: &Settings,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> RunResult {
        // stops workers when discovery fails, without marking the run cancelled
        let stop = cancel.child_token();
        let (jobs_tx, jobs_rx) = async_channel::bounded(settings.queue_capacity.max(1));
        let (failures_tx, collector) = collector::spawn(workers);
        let mut join_set = tokio::task::JoinSet::new();
        for id in 0..workers {
            let worker = worker::Worker {
                id,
                jobs: jobs_rx.clone(),
                destinations: destinations.clone(),
                failures: failures_tx.clone(),
                progress: self.progress.clone(),
                cancel: stop.clone(),
            };
            join_set.spawn(worker.run());
        }
        drop(jobs_rx);
        drop(failures_tx);
        let mut discovery = discovery::Discovery {
            root: source_root.to_path_buf(),
            organizing_folder: organizing_folder.into(),
            extensions: settings.extensions.clone(),
            extractor: self.extractor.clone(),
            jobs: jobs_tx,
            progress: self.progress.clone(),
            cancel: cancel.clone(),
            names: job::NameRegistry::default(),
            files: 0,
            date_folders: Default::default(),
        };
        let discovered = discovery.run().await;
        // no more jobs: workers exit once the queue is drained
        discovery.jobs.close();
        let aborted = match discovered {
            Ok(()) => None,
            Err(error) => {
                if !error.is_cancelled() {
                    tracing::error!("discovery failed: {}", error.display_chain());
                    stop.cancel();
                }
                Some(error)
            }
        };
        while let Some(joined) = join_set.join_next().await {
            if let Err(error) = joined {
                tracing::error!("transfer worker failed: {}", error);
            }
        }
        let mut failures = match collector.await {
            Ok(failures) => failures,
            Err(error) => {
                tracing::error!("failure collector failed: {}", error);
                Vec::new()
            }
        };
        failures.sort_by(|a, b| a.source_path.cmp(&b.source_path));
        // cancellation may arrive after discovery finished
        let aborted = aborted.or_else(|| cancel.is_cancelled().then_some(Error::Cancelled));
        let summary = Summary::from_progress(
            &self.progress,
            discovery.files,
            discovery.date_folders,
            destinations.len(),
            std::time::Duration::ZERO,
        );
        RunResult {
            failures,
            summary,
            aborted,
        }
    }
}
