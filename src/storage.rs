//! Uploaded file persistence
//!
//! Datasets and submissions keep a reference (`file_path`) to the original
//! upload. The store is a trait so deployments can swap the local directory
//! for object storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persist `bytes` and return the reference to store in the database
    async fn save(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<String>;

    async fn load(&self, reference: &str) -> std::io::Result<Vec<u8>>;

    /// Remove a stored file; missing files are not an error
    async fn delete(&self, reference: &str) -> std::io::Result<()>;
}

/// Files under a local upload directory, named `<uuid>-<original name>`
#[derive(Clone, Debug)]
pub struct LocalFileStore {
    base_path: PathBuf,
}

impl LocalFileStore {
    pub async fn new(base_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).await?;
        info!("Using upload directory {:?}", base_path);
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, reference: &str) -> std::io::Result<PathBuf> {
        let name = Path::new(reference);
        // References are bare file names; anything else would escape the store
        if name.components().count() != 1 || name.file_name().is_none() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Invalid file reference '{}'", reference),
            ));
        }
        Ok(self.base_path.join(name))
    }
}

fn sanitize(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload");
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<String> {
        let reference = format!("{}-{}", uuid::Uuid::new_v4(), sanitize(file_name));
        let path = self.base_path.join(&reference);
        fs::write(&path, bytes).await?;
        debug!("Stored {} ({} bytes) as {:?}", file_name, bytes.len(), path);
        Ok(reference)
    }

    async fn load(&self, reference: &str) -> std::io::Result<Vec<u8>> {
        fs::read(self.resolve(reference)?).await
    }

    async fn delete(&self, reference: &str) -> std::io::Result<()> {
        match fs::remove_file(self.resolve(reference)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
