use std::sync::Arc;

use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectStore};
use sha2::{Digest, Sha256};

use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Content-addressed cache for compiled PDF artifacts.
///
/// Keys are derived from the source content hash, so identical content maps
/// to one artifact and a changed document naturally misses the cache.
#[derive(Clone)]
pub struct ArtifactStore {
    store: DynStore,
}

impl ArtifactStore {
    pub fn new(cfg: &AppConfig) -> Result<Self, object_store::Error> {
        let store: DynStore = match cfg.storage {
            StorageKind::Local => {
                std::fs::create_dir_all(&cfg.data_dir).map_err(|source| {
                    object_store::Error::Generic {
                        store: "LocalFileSystem",
                        source: Box::new(source),
                    }
                })?;
                Arc::new(LocalFileSystem::new_with_prefix(&cfg.data_dir)?)
            }
            StorageKind::Memory => Arc::new(InMemory::new()),
        };

        Ok(Self { store })
    }

    /// In-memory store for tests.
    pub fn memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
        }
    }

    pub fn artifact_key(content: &str) -> String {
        let digest = Sha256::digest(content.as_bytes());
        format!("artifacts/{digest:x}.pdf")
    }

    pub async fn put_artifact(&self, content: &str, data: Bytes) -> object_store::Result<()> {
        let path = ObjPath::from(Self::artifact_key(content));
        let payload = object_store::PutPayload::from_bytes(data);
        self.store.put(&path, payload).await.map(|_| ())
    }

    /// Cache lookup by content hash; a miss is `None`, not an error.
    pub async fn get_artifact(&self, content: &str) -> object_store::Result<Option<Bytes>> {
        let path = ObjPath::from(Self::artifact_key(content));
        match self.store.get(&path).await {
            Ok(result) => Ok(Some(result.bytes().await?)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
