//! Backend writing through an OS-level mount of the remote shares
//!
//! A host's shares are expected under a local directory, one subdirectory per share:
//!
//! ```text
//! /mnt/nas.local          <- Target::mount_point (default: /mnt/<host>)
//! ├── Photos              <- share "Photos"
//! └── Editing             <- share "Editing"
//! ```
//!
//! Connecting verifies the mount point, mounting verifies the share directory. Authentication is
//! left to the operating system mount.

use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, Default)]
pub struct MountedConnector;

impl MountedConnector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
    /// Local directory the shares of `target` are expected under.
    #[must_use]
    pub fn mount_root(target: &crate::Target) -> std::path::PathBuf {
        target
            .mount_point
            .clone()
            .unwrap_or_else(|| std::path::Path::new("/mnt").join(&target.host))
    }
}

async fn check_directory(path: &std::path::Path) -> crate::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(crate::Error::Rejected(format!(
            "{path:?} is not a directory"
        ))),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            Err(crate::Error::NotFound(path.display().to_string()))
        }
        Err(error) => Err(error.into()),
    }
}

#[async_trait::async_trait]
impl crate::Connector for MountedConnector {
    async fn connect(
        &self,
        target: &crate::Target,
        timeout: std::time::Duration,
    ) -> crate::Result<Box<dyn crate::Session>> {
        let root = Self::mount_root(target);
        tracing::debug!("checking mount point {:?} for {}", root, target);
        match tokio::time::timeout(timeout, check_directory(&root)).await {
            Ok(result) => result?,
            Err(_) => return Err(crate::Error::Timeout(timeout)),
        }
        Ok(Box::new(MountedSession { root }))
    }
}

struct MountedSession {
    root: std::path::PathBuf,
}

#[async_trait::async_trait]
impl crate::Session for MountedSession {
    async fn mount(&self, share: &str) -> crate::Result<Box<dyn crate::Share>> {
        let root = crate::path::to_local(&self.root, share)?;
        check_directory(&root).await?;
        tracing::debug!("share {:?} available at {:?}", share, root);
        Ok(Box::new(MountedShare { root }))
    }
    async fn logoff(&self) {}
}

struct MountedShare {
    root: std::path::PathBuf,
}

impl MountedShare {
    async fn write_file(
        local: &std::path::Path,
        data: &mut (dyn tokio::io::AsyncRead + Send + Unpin),
    ) -> std::io::Result<u64> {
        let mut file = tokio::fs::File::create(local).await?;
        let written = tokio::io::copy(data, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait::async_trait]
impl crate::Share for MountedShare {
    async fn mkdir(&self, path: &str) -> crate::Result<()> {
        let local = crate::path::to_local(&self.root, path)?;
        match tokio::fs::create_dir(&local).await {
            Ok(()) => Ok(()),
            Err(error) => match error.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    Err(crate::Error::AlreadyExists(path.to_string()))
                }
                std::io::ErrorKind::NotFound => Err(crate::Error::NotFound(path.to_string())),
                _ => Err(error.into()),
            },
        }
    }
    async fn create_and_write(
        &self,
        path: &str,
        data: &mut (dyn tokio::io::AsyncRead + Send + Unpin),
    ) -> crate::Result<u64> {
        let local = crate::path::to_local(&self.root, path)?;
        match Self::write_file(&local, data).await {
            Ok(written) => Ok(written),
            Err(error) => {
                // don't leave a truncated file behind
                if let Err(remove_error) = tokio::fs::remove_file(&local).await {
                    tracing::debug!(
                        "failed removing partial file {:?}: {}",
                        local,
                        remove_error
                    );
                }
                Err(error.into())
            }
        }
    }
    async fn unmount(&self) {}
}
