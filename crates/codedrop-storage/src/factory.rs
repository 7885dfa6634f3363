#[cfg(feature = "storage-local")]
use crate::LocalStore;
#[cfg(feature = "storage-memory")]
use crate::MemoryStore;
use crate::{ExpiringStore, StorageBackend, StorageResult};
#[cfg(not(all(feature = "storage-local", feature = "storage-memory")))]
use crate::StorageError;
use codedrop_core::{Clock, Config};
use std::sync::Arc;

/// Create a store backend based on configuration
pub async fn create_store(
    config: &Config,
    clock: Arc<dyn Clock>,
) -> StorageResult<Arc<dyn ExpiringStore>> {
    match config.storage_backend() {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let store = LocalStore::open(config.local_storage_path(), clock).await?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => {
            let _ = clock;
            Err(StorageError::ConfigError(
                "Local storage backend not available (storage-local feature not enabled)"
                    .to_string(),
            ))
        }

        #[cfg(feature = "storage-memory")]
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; uploads are lost on restart");
            Ok(Arc::new(MemoryStore::new(clock)))
        }

        #[cfg(not(feature = "storage-memory"))]
        StorageBackend::Memory => {
            let _ = clock;
            Err(StorageError::ConfigError(
                "Memory storage backend not available (storage-memory feature not enabled)"
                    .to_string(),
            ))
        }
    }
}

#[cfg(all(test, feature = "storage-memory", feature = "storage-local"))]
mod tests {
    use super::*;
    use codedrop_core::SystemClock;

    fn config_with(backend: &str, path: &std::path::Path) -> Config {
        let path = path.display().to_string();
        let backend = backend.to_string();
        Config::from_lookup(move |key| match key {
            "STORAGE_BACKEND" => Some(backend.clone()),
            "LOCAL_STORAGE_PATH" => Some(path.clone()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_factory_builds_configured_backend() {
        let temp_dir = tempfile::tempdir().unwrap();

        let store = create_store(&config_with("memory", temp_dir.path()), Arc::new(SystemClock))
            .await
            .unwrap();
        assert_eq!(store.backend_type(), StorageBackend::Memory);

        let store = create_store(&config_with("local", temp_dir.path()), Arc::new(SystemClock))
            .await
            .unwrap();
        assert_eq!(store.backend_type(), StorageBackend::Local);
        assert!(temp_dir.path().join("entries").is_dir());
    }
}
