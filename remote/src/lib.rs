//! Remote file share client interface for SnapVault destinations
//!
//! Every destination SnapVault copies to is reached through three layers:
//!
//! 1. [`Connector`] - establishes an authenticated [`Session`] with a remote host
//! 2. [`Session`] - mounts a named share on that host
//! 3. [`Share`] - creates directories and streams files into the mounted share
//!
//! [`Connection`] bundles a session with its mounted share and owns their lifecycle.
//!
//! # Backends
//!
//! - [`mounted::MountedConnector`] - writes through an OS-level mount of the share (e.g. a CIFS
//!   mount under `/mnt/<host>`)
//! - [`memory::MemoryConnector`] - keeps everything in memory; used for dry runs and tests
//!
//! # Paths
//!
//! Remote paths are always relative to the share root and use `/` as the separator. See the
//! [`path`] module for the helpers that build and validate them.
//!
//! # Concurrency
//!
//! All traits require `Send + Sync`, but a backend is only expected to handle one operation at a
//! time per [`Connection`]. Callers that need parallelism open several connections to the same
//! target.

pub mod memory;
pub mod mounted;
pub mod path;

/// Port used when a target does not specify one (SMB over TCP).
pub const DEFAULT_PORT: u16 = 445;

/// Errors reported by remote share operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Directory or file already present; not a failure for idempotent directory creation.
    #[error("remote path {0:?} already exists")]
    AlreadyExists(String),
    #[error("remote path {0:?} not found")]
    NotFound(String),
    #[error("invalid remote path {0:?}")]
    InvalidPath(String),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Credentials presented when establishing a session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub domain: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

/// Fully resolved connection parameters of one remote share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub share: String,
    pub credentials: Credentials,
    /// Local directory the host's shares are mounted under (mounted backend only)
    pub mount_point: Option<std::path::PathBuf>,
}

impl Target {
    #[must_use]
    pub fn new(host: &str, share: &str) -> Self {
        Self {
            host: host.to_string(),
            port: DEFAULT_PORT,
            share: share.to_string(),
            credentials: Credentials::default(),
            mount_point: None,
        }
    }
    /// `host:port` address of the target.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "//{}/{}", self.host, self.share)
    }
}

#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Establish an authenticated session with `target`, giving up after `timeout`.
    async fn connect(
        &self,
        target: &Target,
        timeout: std::time::Duration,
    ) -> Result<Box<dyn Session>>;
}

#[async_trait::async_trait]
pub trait Session: Send + Sync {
    async fn mount(&self, share: &str) -> Result<Box<dyn Share>>;
    async fn logoff(&self);
}

#[async_trait::async_trait]
pub trait Share: Send + Sync {
    /// Create a single directory. The parent must already exist.
    ///
    /// Returns [`Error::AlreadyExists`] when the path is already present.
    async fn mkdir(&self, path: &str) -> Result<()>;
    /// Create (or truncate) the file at `path` and stream `data` into it.
    ///
    /// Returns the number of bytes written.
    async fn create_and_write(
        &self,
        path: &str,
        data: &mut (dyn tokio::io::AsyncRead + Send + Unpin),
    ) -> Result<u64>;
    async fn unmount(&self);
}

/// A mounted share together with the session it was mounted on.
pub struct Connection {
    target: Target,
    session: Box<dyn Session>,
    share: Box<dyn Share>,
}

impl Connection {
    /// Connect to `target` and mount its share.
    ///
    /// `timeout` bounds connecting and mounting together. The session is logged off again if
    /// mounting fails, times out or is cancelled, so a failed open leaves nothing behind.
    pub async fn open(
        connector: &dyn Connector,
        target: &Target,
        timeout: std::time::Duration,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<Self> {
        tracing::debug!("connecting to {} ({})", target, target.address());
        let deadline = tokio::time::Instant::now() + timeout;
        let session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            connected = tokio::time::timeout_at(deadline, connector.connect(target, timeout)) => {
                match connected {
                    Ok(session) => session?,
                    Err(_) => return Err(Error::Timeout(timeout)),
                }
            }
        };
        let mounted = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            mounted = tokio::time::timeout_at(deadline, session.mount(&target.share)) => {
                mounted.unwrap_or(Err(Error::Timeout(timeout)))
            }
        };
        let share = match mounted {
            Ok(share) => share,
            Err(error) => {
                tracing::debug!("mounting {} failed, logging off: {:#}", target, &error);
                session.logoff().await;
                return Err(error);
            }
        };
        Ok(Self {
            target: target.clone(),
            session,
            share,
        })
    }
    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }
    #[must_use]
    pub fn share(&self) -> &dyn Share {
        self.share.as_ref()
    }
    /// Unmount the share and log off the session.
    pub async fn close(&self) {
        tracing::debug!("unmounting {}", self.target);
        self.share.unmount().await;
        self.session.logoff().await;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
