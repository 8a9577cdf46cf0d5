use bytes::Bytes;
use std::sync::Arc;

use crate::backend::{BackendKind, DhtBackend, MemoryBackend, StorageBackend};
use crate::config::Config;
use crate::error::{FrontendError, Result, StartupError};
use crate::quota::{QuotaLimits, QuotaTracker};

/// Front end service state: the backend in use plus the write quota.
/// Handlers share one instance through `Arc`.
pub struct Frontend {
    backend: Arc<dyn StorageBackend>,
    quota: QuotaTracker,
}

impl Frontend {
    pub fn new(backend: Arc<dyn StorageBackend>, limits: QuotaLimits) -> Self {
        Self {
            backend,
            quota: QuotaTracker::new(limits),
        }
    }

    /// Front end over a fresh in-memory map with the default limits.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), QuotaLimits::default())
    }

    /// Pick the backend named in the configuration.
    pub fn from_config(config: &Config) -> Result<Self, StartupError> {
        let backend: Arc<dyn StorageBackend> = match config.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::Dht => Arc::new(
                DhtBackend::new(&config.nodes, config.node_port)
                    .map_err(|e| StartupError::InvalidConfiguration(e.to_string()))?,
            ),
        };

        Ok(Self::new(backend, QuotaLimits::default()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    /// Look up `key`.
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        self.backend
            .get(key)
            .await?
            .ok_or(FrontendError::KeyNotFound)
    }

    /// Store `value` under `key` if the quota allows it.
    ///
    /// The quota is charged before the backend is called. If the backend then
    /// fails, the charge is handed back.
    pub async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        let reservation = self.quota.reserve(value.len() as u64)?;

        if let Err(err) = self.backend.put(key, value).await {
            self.quota.release(reservation);
            return Err(err.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use async_trait::async_trait;

    struct FailingBackend;

    #[async_trait]
    impl StorageBackend for FailingBackend {
        async fn get(&self, _key: &str) -> std::result::Result<Option<Bytes>, BackendError> {
            Err(BackendError::UnexpectedStatus {
                node: "http://node-a:8000".to_string(),
                status: 503,
            })
        }

        async fn put(&self, _key: &str, _value: Bytes) -> std::result::Result<(), BackendError> {
            Err(BackendError::NoNodes)
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn small_limits() -> QuotaLimits {
        QuotaLimits {
            max_content_length: 8,
            max_storage_size: 16,
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let frontend = Frontend::in_memory();
        frontend.put("abc", Bytes::from_static(b"12345")).await.unwrap();
        assert_eq!(frontend.get("abc").await.unwrap(), "12345");
        assert_eq!(frontend.quota().usage(), 5);
        assert_eq!(frontend.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_missing_key() {
        let frontend = Frontend::in_memory();
        assert!(matches!(
            frontend.get("missing").await,
            Err(FrontendError::KeyNotFound)
        ));
    }

    #[tokio::test]
    async fn test_oversized_value_is_not_stored() {
        let frontend = Frontend::new(Arc::new(MemoryBackend::new()), small_limits());
        let err = frontend.put("k", Bytes::from(vec![b'x'; 9])).await.unwrap_err();
        assert!(matches!(err, FrontendError::PayloadTooLarge));
        assert_eq!(frontend.quota().usage(), 0);
        assert!(matches!(frontend.get("k").await, Err(FrontendError::KeyNotFound)));
    }

    #[tokio::test]
    async fn test_exhausted_storage_rejects_and_does_not_store() {
        let frontend = Frontend::new(Arc::new(MemoryBackend::new()), small_limits());
        frontend.put("a", Bytes::from(vec![b'a'; 8])).await.unwrap();
        frontend.put("b", Bytes::from(vec![b'b'; 8])).await.unwrap();

        let err = frontend.put("c", Bytes::from_static(b"c")).await.unwrap_err();
        assert!(matches!(err, FrontendError::StorageExhausted));
        assert!(matches!(frontend.get("c").await, Err(FrontendError::KeyNotFound)));
        assert_eq!(frontend.quota().usage(), 16);
    }

    #[tokio::test]
    async fn test_overwrite_is_charged_again() {
        let frontend = Frontend::new(Arc::new(MemoryBackend::new()), small_limits());
        frontend.put("k", Bytes::from_static(b"1234")).await.unwrap();
        frontend.put("k", Bytes::from_static(b"1234")).await.unwrap();

        assert_eq!(frontend.get("k").await.unwrap(), "1234");
        assert_eq!(frontend.quota().usage(), 8);
    }

    #[tokio::test]
    async fn test_backend_failure_releases_quota() {
        let frontend = Frontend::new(Arc::new(FailingBackend), small_limits());
        let err = frontend.put("k", Bytes::from_static(b"1234")).await.unwrap_err();
        assert!(matches!(err, FrontendError::Backend(BackendError::NoNodes)));
        assert_eq!(frontend.quota().usage(), 0);
    }

    #[tokio::test]
    async fn test_backend_get_failure_passes_message_through() {
        let frontend = Frontend::new(Arc::new(FailingBackend), small_limits());
        let err = frontend.get("k").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Internal Error: storage node http://node-a:8000 answered with status 503"
        );
    }
}
