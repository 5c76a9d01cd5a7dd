//! Source tree walk
//!
//! Discovery walks the source directory depth first, in name order, and hands every photo it
//! finds to the job queue. The queue is bounded: when workers fall behind, sending blocks and the
//! walk pauses until space frees up. Unreadable entries below the root are logged and skipped;
//! only an unreadable root aborts the run.

use tracing::instrument;

use crate::Error;
use crate::job::{NameRegistry, TransferJob};

/// Photo and RAW formats copied by default.
pub const PHOTO_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "heic", "raw", "cr2", "cr3", "nef", "arw",
    "dng", "orf", "rw2", "raf",
];

/// Case-insensitive file extension filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extensions {
    allowed: std::collections::HashSet<String>,
}

impl Extensions {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn photos() -> Self {
        Self::new(PHOTO_EXTENSIONS)
    }

    #[must_use]
    pub fn matches(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.allowed.contains(&ext.to_lowercase()))
    }
}

impl Default for Extensions {
    fn default() -> Self {
        Self::photos()
    }
}

pub(crate) struct Discovery {
    pub(crate) root: std::path::PathBuf,
    pub(crate) organizing_folder: std::sync::Arc<str>,
    pub(crate) extensions: Extensions,
    pub(crate) extractor: std::sync::Arc<dyn crate::timestamp::Extractor>,
    pub(crate) jobs: async_channel::Sender<TransferJob>,
    pub(crate) progress: std::sync::Arc<common::progress::Progress>,
    pub(crate) cancel: tokio_util::sync::CancellationToken,
    pub(crate) names: NameRegistry,
    /// Files handed to the queue
    pub(crate) files: usize,
    /// Queued files per date folder
    pub(crate) date_folders: std::collections::BTreeMap<String, usize>,
}

impl Discovery {
    fn check_cancelled(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(root = ?self.root))]
    pub(crate) async fn run(&mut self) -> Result<(), Error> {
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            self.check_cancelled()?;
            let entries = match read_dir_sorted(&dir).await {
                Ok(entries) => entries,
                Err(source) if dir == self.root => {
                    return Err(Error::SourceUnreadable { path: dir, source });
                }
                Err(error) => {
                    tracing::warn!("skipping unreadable directory {:?}: {}", dir, error);
                    continue;
                }
            };
            let mut subdirs = Vec::new();
            for (path, file_type) in entries {
                self.check_cancelled()?;
                if file_type.is_dir() {
                    subdirs.push(path);
                    continue;
                }
                // follows symlinks; linked directories are not descended into
                let metadata = match tokio::fs::metadata(&path).await {
                    Ok(metadata) => metadata,
                    Err(error) => {
                        tracing::warn!("skipping {:?}: {}", path, error);
                        continue;
                    }
                };
                if !metadata.is_file() {
                    tracing::debug!("skipping {:?}: not a regular file", path);
                    continue;
                }
                if !self.extensions.matches(&path) {
                    tracing::trace!("skipping {:?}: not a photo", path);
                    continue;
                }
                self.queue(path, &metadata).await?;
            }
            pending.extend(subdirs.into_iter().rev());
        }
        tracing::info!("discovery finished, {} files queued", self.files);
        Ok(())
    }

    async fn queue(
        &mut self,
        path: std::path::PathBuf,
        metadata: &std::fs::Metadata,
    ) -> Result<(), Error> {
        let timestamp =
            crate::timestamp::resolve(self.extractor.clone(), &path, metadata.modified().ok())
                .await;
        let folder = crate::job::date_folder(&timestamp);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let remote_name = self.names.reserve(&folder, &file_name);
        if remote_name != file_name {
            tracing::info!(
                "{:?} has the same name as another file in {}, storing as {:?}",
                path,
                folder,
                remote_name
            );
        }
        tracing::debug!("queueing {:?} for {}", path, folder);
        let job = TransferJob {
            source_path: path,
            organizing_folder: self.organizing_folder.clone(),
            timestamp,
            remote_name,
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            sent = self.jobs.send(job) => sent.map_err(|_| Error::WorkersGone)?,
        }
        self.files += 1;
        *self.date_folders.entry(folder).or_default() += 1;
        self.progress.files_queued.inc();
        Ok(())
    }
}

async fn read_dir_sorted(
    dir: &std::path::Path,
) -> std::io::Result<Vec<(std::path::PathBuf, std::fs::FileType)>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut listed = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => match entry.file_type().await {
                Ok(file_type) => listed.push((entry.path(), file_type)),
                Err(error) => tracing::warn!("skipping {:?}: {}", entry.path(), error),
            },
            Ok(None) => break,
            Err(error) => {
                tracing::warn!("error listing {:?}, skipping the rest: {}", dir, error);
                break;
            }
        }
    }
    listed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(listed)
}
