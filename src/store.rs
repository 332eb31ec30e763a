//! Single-writer JSON document store
//!
//! Each service keeps one document holding one array per entity kind. The
//! whole document sits in memory behind an `RwLock`; every mutation is
//! applied to a draft, written to disk, and only then made visible.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{ApiError, ApiResult};

/// A record addressable by id inside a collection
pub trait Entity {
    fn id(&self) -> &str;
}

pub fn find<'a, T: Entity>(items: &'a [T], id: &str) -> Option<&'a T> {
    items.iter().find(|item| item.id() == id)
}

pub fn position<T: Entity>(items: &[T], id: &str) -> Option<usize> {
    items.iter().position(|item| item.id() == id)
}

pub struct JsonStore<D> {
    data: RwLock<D>,
    path: Option<PathBuf>,
}

impl<D> JsonStore<D>
where
    D: Serialize + DeserializeOwned + Default + Clone + Send + Sync,
{
    /// Load the document at `path`, starting empty if the file does not exist yet.
    pub async fn open(path: PathBuf) -> anyhow::Result<Self> {
        let data = if path.exists() {
            let json = tokio::fs::read_to_string(&path).await?;
            tracing::info!("Loaded document from {:?}", path);
            serde_json::from_str(&json)?
        } else {
            tracing::info!("No document at {:?}, starting fresh", path);
            D::default()
        };

        Ok(Self {
            data: RwLock::new(data),
            path: Some(path),
        })
    }

    /// Store that never touches the disk
    pub fn in_memory() -> Self {
        Self {
            data: RwLock::new(D::default()),
            path: None,
        }
    }

    pub async fn read<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        let data = self.data.read().await;
        f(&data)
    }

    /// Apply `f` as one atomic read-modify-write cycle.
    ///
    /// Writers are serialized by the lock. If `f` fails or the document cannot
    /// be written, nothing changes.
    pub async fn write<R>(&self, f: impl FnOnce(&mut D) -> ApiResult<R>) -> ApiResult<R> {
        let mut data = self.data.write().await;
        let mut draft = data.clone();
        let out = f(&mut draft)?;

        if let Some(path) = &self.path {
            persist(path, &draft).await.map_err(|e| {
                tracing::error!("Failed to persist {:?}: {}", path, e);
                ApiError::internal("Could not write to the database")
            })?;
        }

        *data = draft;
        Ok(out)
    }
}

async fn persist<D: Serialize>(path: &Path, data: &D) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, &json).await?;
    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}
