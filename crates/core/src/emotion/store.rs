use super::{ClassifierError, ModelParameters};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("model store io failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Model(#[from] ClassifierError),
}

/// Where a classifier's parameter blob lives between runs.
pub trait ModelStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> BoxFuture<'_, Result<Option<ModelParameters>, StoreError>>;

    fn save(&self, params: ModelParameters) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// JSON blob on disk. Saves go through a sibling temp file and a rename.
#[derive(Clone, Debug)]
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ModelStore for FileModelStore {
    fn load(&self) -> BoxFuture<'_, Result<Option<ModelParameters>, StoreError>> {
        async move {
            let bytes = match tokio::fs::read(&self.path).await {
                Ok(b) => b,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %self.path.display(), "no saved model");
                    return Ok(None);
                }
                Err(e) => return Err(self.io_err(e)),
            };
            let params = ModelParameters::from_blob(&bytes)?;
            tracing::info!(
                path = %self.path.display(),
                trained = params.trained,
                "model loaded"
            );
            Ok(Some(params))
        }
        .boxed()
    }

    fn save(&self, params: ModelParameters) -> BoxFuture<'_, Result<(), StoreError>> {
        async move {
            let blob = params.to_blob()?;
            if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| self.io_err(e))?;
            }
            let tmp = self.path.with_extension("json.tmp");
            tokio::fs::write(&tmp, &blob)
                .await
                .map_err(|e| self.io_err(e))?;
            tokio::fs::rename(&tmp, &self.path)
                .await
                .map_err(|e| self.io_err(e))?;
            tracing::info!(path = %self.path.display(), bytes = blob.len(), "model saved");
            Ok(())
        }
        .boxed()
    }
}

/// In-process store, mostly for tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryModelStore {
    blob: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for MemoryModelStore {
    fn load(&self) -> BoxFuture<'_, Result<Option<ModelParameters>, StoreError>> {
        async move {
            match self.blob.lock().await.as_deref() {
                Some(bytes) => Ok(Some(ModelParameters::from_blob(bytes)?)),
                None => Ok(None),
            }
        }
        .boxed()
    }

    fn save(&self, params: ModelParameters) -> BoxFuture<'_, Result<(), StoreError>> {
        async move {
            let blob = params.to_blob()?;
            *self.blob.lock().await = Some(blob);
            Ok(())
        }
        .boxed()
    }
}
