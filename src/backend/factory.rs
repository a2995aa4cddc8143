use crate::backend::{IndexBackend, MemoryBackend, RedisBackend, SledBackend};
use crate::config::{BackendConfig, BackendKind};
use crate::error::{ClientError, Result};
use std::sync::Arc;

/// Create an index backend based on configuration
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn IndexBackend>> {
    match config.kind {
        BackendKind::Memory => Ok(create_memory_backend()),

        BackendKind::Sled => {
            let path = config.sled_path.as_ref().ok_or_else(|| {
                ClientError::Configuration(
                    "Sled backend requires 'sled_path' configuration".to_string(),
                )
            })?;

            tracing::info!(path = ?path, "Initializing Sled index backend");

            let backend = SledBackend::new(path)?;
            Ok(Arc::new(backend))
        }

        BackendKind::Redis => {
            let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                ClientError::Configuration(
                    "Redis backend requires 'redis_url' configuration".to_string(),
                )
            })?;

            tracing::info!(url = %redis_url, "Initializing Redis index backend");

            let backend = RedisBackend::new(redis_url)?;
            Ok(Arc::new(backend))
        }
    }
}

/// Create an in-memory backend (for testing and development)
pub fn create_memory_backend() -> Arc<dyn IndexBackend> {
    tracing::info!("Initializing in-memory index backend");
    Arc::new(MemoryBackend::new())
}
