/// Remote directories known to exist on one destination.
///
/// Shared by all workers writing to that destination. A path is only recorded after its
/// `mkdir` succeeded (or the directory turned out to exist already), so a failed creation is
/// retried by the next job that needs it. Two workers may race to create the same directory; the
/// loser sees "already exists", which counts as success.
#[derive(Debug, Default)]
pub struct DirectoryCache {
    known: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl DirectoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn known(&self) -> std::sync::MutexGuard<'_, std::collections::HashSet<String>> {
        self.known
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.known().contains(path)
    }

    /// Returns `true` when `path` was not recorded before.
    pub fn insert(&self, path: &str) -> bool {
        self.known().insert(path.to_string())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.known().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known().is_empty()
    }

    /// Make sure `path` and all its ancestors exist on `share`.
    ///
    /// Returns the number of directories this call created. Stops before the next `mkdir` once
    /// `cancel` fires, leaving the rest of the chain for a later run.
    pub async fn ensure(
        &self,
        share: &dyn remote::Share,
        path: &str,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> remote::Result<u64> {
        let mut created = 0;
        for dir in remote::path::ancestors(path) {
            if self.contains(&dir) {
                continue;
            }
            if cancel.is_cancelled() {
                tracing::debug!("cancelled before creating {:?}", dir);
                break;
            }
            match share.mkdir(&dir).await {
                Ok(()) => {
                    tracing::debug!("created directory {:?}", dir);
                    created += 1;
                }
                Err(error) if error.is_already_exists() => {
                    tracing::trace!("directory {:?} already exists", dir);
                }
                Err(error) => return Err(error),
            }
            self.insert(&dir);
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn share(connector: &remote::memory::MemoryConnector) -> remote::Connection {
        remote::Connection::open(
            connector,
            &remote::Target::new("nas", "Photos"),
            std::time::Duration::from_secs(1),
            &tokio_util::sync::CancellationToken::new(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn creates_missing_ancestors_once() {
        let connector = remote::memory::MemoryConnector::new();
        let connection = share(&connector).await;
        let cancel = tokio_util::sync::CancellationToken::new();
        let cache = DirectoryCache::new();
        let created = cache
            .ensure(connection.share(), "Photoshoots/2025 - Wedding/2025-01-15", &cancel)
            .await
            .unwrap();
        assert_eq!(created, 3);
        assert_eq!(cache.len(), 3);
        let created = cache
            .ensure(connection.share(), "Photoshoots/2025 - Wedding/2025-01-16", &cancel)
            .await
            .unwrap();
        assert_eq!(created, 1);
        assert_eq!(
            connector.mkdir_calls("nas", "Photos"),
            vec![
                "Photoshoots",
                "Photoshoots/2025 - Wedding",
                "Photoshoots/2025 - Wedding/2025-01-15",
                "Photoshoots/2025 - Wedding/2025-01-16",
            ]
        );
    }

    #[tokio::test]
    async fn existing_directories_count_as_created() {
        let connector = remote::memory::MemoryConnector::new();
        let connection = share(&connector).await;
        let cancel = tokio_util::sync::CancellationToken::new();
        connection.share().mkdir("Photoshoots").await.unwrap();
        let cache = DirectoryCache::new();
        let created = cache
            .ensure(connection.share(), "Photoshoots/2025 - Wedding", &cancel)
            .await
            .unwrap();
        assert_eq!(created, 1);
        assert!(cache.contains("Photoshoots"));
        assert!(cache.contains("Photoshoots/2025 - Wedding"));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let connector = remote::memory::MemoryConnector::new();
        let connection = share(&connector).await;
        let cancel = tokio_util::sync::CancellationToken::new();
        let mut data: &[u8] = b"not a directory";
        connection
            .share()
            .create_and_write("Photoshoots", &mut data)
            .await
            .unwrap();
        let cache = DirectoryCache::new();
        // a file in the way looks like "already exists" to mkdir, the child then fails
        assert!(cache
            .ensure(connection.share(), "Photoshoots/2025 - Wedding", &cancel)
            .await
            .is_err());
        assert!(!cache.contains("Photoshoots/2025 - Wedding"));
    }

    #[tokio::test]
    async fn cancelled_ensure_creates_nothing() {
        let connector = remote::memory::MemoryConnector::new();
        let connection = share(&connector).await;
        let cancel = tokio_util::sync::CancellationToken::new();
        cancel.cancel();
        let cache = DirectoryCache::new();
        let created = cache
            .ensure(connection.share(), "Photoshoots/2025 - Wedding", &cancel)
            .await
            .unwrap();
        assert_eq!(created, 0);
        assert!(cache.is_empty());
        assert!(connector.mkdir_calls("nas", "Photos").is_empty());
    }
}
