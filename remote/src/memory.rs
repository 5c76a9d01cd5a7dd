//! In-memory backend
//!
//! Behaves like a real share: directories must be created parent-first, existing paths are
//! reported as [`crate::Error::AlreadyExists`], and every `mkdir` call is recorded so callers can
//! inspect how many round trips a transfer cost. Used for dry runs and in tests, where faults can
//! be injected per host or per path.

use tokio::io::AsyncReadExt;

#[derive(Debug)]
struct FileEntry {
    size: u64,
    /// `None` when the connector only records sizes
    data: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct ShareState {
    directories: std::collections::BTreeSet<String>,
    files: std::collections::BTreeMap<String, FileEntry>,
    mkdir_calls: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    shares: std::collections::HashMap<String, ShareState>,
    missing_shares: std::collections::HashSet<String>,
    unreachable_hosts: std::collections::HashSet<String>,
    failing_writes: Vec<String>,
    write_delay: Option<std::time::Duration>,
    mount_delay: Option<std::time::Duration>,
    /// `mkdir` and write calls across all shares, logged when they start
    operations: Vec<String>,
    open_sessions: usize,
    sizes_only: bool,
}

fn share_key(host: &str, share: &str) -> String {
    format!("{host}/{share}")
}

/// Cheaply cloneable handle; all clones observe the same shares.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: std::sync::Arc<std::sync::Mutex<State>>,
}

impl MemoryConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Record file sizes only and discard contents (dry runs).
    #[must_use]
    pub fn sizes_only() -> Self {
        let connector = Self::default();
        connector.lock().sizes_only = true;
        connector
    }
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
    /// Make every connection attempt to `host` fail.
    pub fn set_unreachable(&self, host: &str) {
        self.lock().unreachable_hosts.insert(host.to_string());
    }
    /// Make mounting `share` on `host` fail.
    pub fn set_missing_share(&self, host: &str, share: &str) {
        self.lock().missing_shares.insert(share_key(host, share));
    }
    /// Fail writes to any remote path ending with `suffix`, after part of the data was read.
    pub fn fail_writes_to(&self, suffix: &str) {
        self.lock().failing_writes.push(suffix.to_string());
    }
    /// Delay every write by `delay`.
    pub fn set_write_delay(&self, delay: std::time::Duration) {
        self.lock().write_delay = Some(delay);
    }
    /// Delay every mount by `delay`.
    pub fn set_mount_delay(&self, delay: std::time::Duration) {
        self.lock().mount_delay = Some(delay);
    }
    /// Every `mkdir` and `create_and_write` call started so far, as `"mkdir //host/share/path"` or
    /// `"write //host/share/path"`, in start order.
    #[must_use]
    pub fn operations(&self) -> Vec<String> {
        self.lock().operations.clone()
    }
    /// Number of sessions connected and not yet logged off.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }
    /// Files on a share with their sizes, sorted by path.
    #[must_use]
    pub fn files(&self, host: &str, share: &str) -> Vec<(String, u64)> {
        self.lock()
            .shares
            .get(&share_key(host, share))
            .map(|state| {
                state
                    .files
                    .iter()
                    .map(|(path, entry)| (path.clone(), entry.size))
                    .collect()
            })
            .unwrap_or_default()
    }
    /// Contents of one file, if present.
    #[must_use]
    pub fn read(&self, host: &str, share: &str, path: &str) -> Option<Vec<u8>> {
        self.lock()
            .shares
            .get(&share_key(host, share))
            .and_then(|state| state.files.get(path))
            .and_then(|entry| entry.data.clone())
    }
    /// Directories on a share, sorted.
    #[must_use]
    pub fn directories(&self, host: &str, share: &str) -> Vec<String> {
        self.lock()
            .shares
            .get(&share_key(host, share))
            .map(|state| state.directories.iter().cloned().collect())
            .unwrap_or_default()
    }
    /// Every `mkdir` call issued against a share, in call order.
    #[must_use]
    pub fn mkdir_calls(&self, host: &str, share: &str) -> Vec<String> {
        self.lock()
            .shares
            .get(&share_key(host, share))
            .map(|state| state.mkdir_calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl crate::Connector for MemoryConnector {
    async fn connect(
        &self,
        target: &crate::Target,
        _timeout: std::time::Duration,
    ) -> crate::Result<Box<dyn crate::Session>> {
        let mut state = self.lock();
        if state.unreachable_hosts.contains(&target.host) {
            return Err(crate::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("connection to {} refused", target.address()),
            )));
        }
        state.open_sessions += 1;
        Ok(Box::new(MemorySession {
            connector: self.clone(),
            host: target.host.clone(),
            logged_off: std::sync::atomic::AtomicBool::new(false),
        }))
    }
}

struct MemorySession {
    connector: MemoryConnector,
    host: String,
    logged_off: std::sync::atomic::AtomicBool,
}

#[async_trait::async_trait]
impl crate::Session for MemorySession {
    async fn mount(&self, share: &str) -> crate::Result<Box<dyn crate::Share>> {
        let delay = self.connector.lock().mount_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let key = share_key(&self.host, share);
        let mut state = self.connector.lock();
        if state.missing_shares.contains(&key) {
            return Err(crate::Error::NotFound(share.to_string()));
        }
        state.shares.entry(key.clone()).or_default();
        Ok(Box::new(MemoryShare {
            connector: self.connector.clone(),
            key,
        }))
    }
    async fn logoff(&self) {
        if !self
            .logged_off
            .swap(true, std::sync::atomic::Ordering::AcqRel)
        {
            self.connector.lock().open_sessions -= 1;
        }
    }
}

struct MemoryShare {
    connector: MemoryConnector,
    key: String,
}

impl MemoryShare {
    fn parent_exists(state: &ShareState, path: &str) -> bool {
        match path.rsplit_once('/') {
            Some((parent, _)) => state.directories.contains(parent),
            None => true,
        }
    }
}

#[async_trait::async_trait]
impl crate::Share for MemoryShare {
    async fn mkdir(&self, path: &str) -> crate::Result<()> {
        crate::path::validate(path)?;
        let mut state = self.connector.lock();
        state.operations.push(format!("mkdir //{}/{}", self.key, path));
        let share = state.shares.entry(self.key.clone()).or_default();
        share.mkdir_calls.push(path.to_string());
        if share.directories.contains(path) || share.files.contains_key(path) {
            return Err(crate::Error::AlreadyExists(path.to_string()));
        }
        if !Self::parent_exists(share, path) {
            return Err(crate::Error::NotFound(path.to_string()));
        }
        share.directories.insert(path.to_string());
        Ok(())
    }
    async fn create_and_write(
        &self,
        path: &str,
        data: &mut (dyn tokio::io::AsyncRead + Send + Unpin),
    ) -> crate::Result<u64> {
        crate::path::validate(path)?;
        let (delay, fail, sizes_only) = {
            let mut state = self.connector.lock();
            state.operations.push(format!("write //{}/{}", self.key, path));
            let parent_ok = state
                .shares
                .get(&self.key)
                .is_some_and(|share| Self::parent_exists(share, path));
            if !parent_ok {
                return Err(crate::Error::NotFound(path.to_string()));
            }
            let fail = state
                .failing_writes
                .iter()
                .any(|suffix| path.ends_with(suffix.as_str()));
            (state.write_delay, fail, state.sizes_only)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            let mut partial = [0u8; 1];
            let _ = data.read(&mut partial).await?;
            return Err(crate::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset during transfer",
            )));
        }
        let entry = if sizes_only {
            let size = tokio::io::copy(data, &mut tokio::io::sink()).await?;
            FileEntry { size, data: None }
        } else {
            let mut buffer = Vec::new();
            data.read_to_end(&mut buffer).await?;
            FileEntry {
                size: buffer.len() as u64,
                data: Some(buffer),
            }
        };
        let written = entry.size;
        let mut state = self.connector.lock();
        let share = state.shares.entry(self.key.clone()).or_default();
        if share.directories.contains(path) {
            return Err(crate::Error::AlreadyExists(path.to_string()));
        }
        share.files.insert(path.to_string(), entry);
        Ok(written)
    }
    async fn unmount(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Connector;

    async fn mounted(connector: &MemoryConnector) -> Box<dyn crate::Share> {
        let session = connector
            .connect(
                &crate::Target::new("nas", "Photos"),
                std::time::Duration::from_secs(1),
            )
            .await
            .unwrap();
        session.mount("Photos").await.unwrap()
    }

    #[tokio::test]
    async fn mkdir_requires_parent_and_reports_existing() {
        let connector = MemoryConnector::new();
        let share = mounted(&connector).await;
        assert!(matches!(
            share.mkdir("a/b").await,
            Err(crate::Error::NotFound(_))
        ));
        share.mkdir("a").await.unwrap();
        share.mkdir("a/b").await.unwrap();
        assert!(share.mkdir("a").await.unwrap_err().is_already_exists());
        assert_eq!(connector.directories("nas", "Photos"), vec!["a", "a/b"]);
        assert_eq!(
            connector.mkdir_calls("nas", "Photos"),
            vec!["a/b", "a", "a/b", "a"]
        );
    }

    #[tokio::test]
    async fn writes_are_recorded() {
        let connector = MemoryConnector::new();
        let share = mounted(&connector).await;
        share.mkdir("a").await.unwrap();
        let mut data: &[u8] = b"abc";
        assert_eq!(share.create_and_write("a/x.jpg", &mut data).await.unwrap(), 3);
        assert_eq!(
            connector.files("nas", "Photos"),
            vec![("a/x.jpg".to_string(), 3)]
        );
        assert_eq!(
            connector.read("nas", "Photos", "a/x.jpg").unwrap(),
            b"abc".to_vec()
        );
        let mut data: &[u8] = b"abc";
        assert!(matches!(
            share.create_and_write("missing/x.jpg", &mut data).await,
            Err(crate::Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn sizes_only_discards_contents() {
        let connector = MemoryConnector::sizes_only();
        let share = mounted(&connector).await;
        let mut data: &[u8] = b"abcdef";
        share.create_and_write("x.jpg", &mut data).await.unwrap();
        assert_eq!(connector.files("nas", "Photos"), vec![("x.jpg".to_string(), 6)]);
        assert!(connector.read("nas", "Photos", "x.jpg").is_none());
    }

    #[tokio::test]
    async fn injected_faults() {
        let connector = MemoryConnector::new();
        connector.set_unreachable("offline");
        let result = connector
            .connect(
                &crate::Target::new("offline", "Photos"),
                std::time::Duration::from_secs(1),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(connector.open_sessions(), 0);
        connector.fail_writes_to("bad.jpg");
        let share = mounted(&connector).await;
        let mut data: &[u8] = b"abc";
        assert!(share.create_and_write("bad.jpg", &mut data).await.is_err());
        assert!(connector.files("nas", "Photos").is_empty());
    }
}
