use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use super::{sniff, ImageStore, ImageUpload, StoredImage};
use crate::{AppError, AppResult};

pub const UPLOADS_ROUTE: &str = "/uploads";

/// Images written under a directory that the HTTP layer serves at `/uploads`.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    dir: PathBuf,
    base_url: String,
}

impl LocalImageStore {
    pub fn new(dir: impl Into<PathBuf>, public_base: &str) -> Self {
        Self {
            dir: dir.into(),
            base_url: format!("{}{UPLOADS_ROUTE}", public_base.trim_end_matches('/')),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Only bare generated names are accepted, never paths.
    fn resolve(&self, name: &str) -> AppResult<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(AppError::new("UPLOAD/INVALID_NAME", "Nome de arquivo inválido")
                .with_context("name", name));
        }
        Ok(self.dir.join(name))
    }

    pub async fn read(&self, name: &str) -> AppResult<Vec<u8>> {
        let path = self.resolve(name)?;
        Ok(tokio::fs::read(&path).await?)
    }

    async fn store(&self, bytes: Vec<u8>) -> AppResult<StoredImage> {
        let kind = sniff(&bytes)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let name = format!("{}.{}", Uuid::new_v4().simple(), kind.extension);
        let path = self.resolve(&name)?;
        tokio::fs::write(&path, &bytes).await?;
        tracing::info!(target: "imobiliaria", event = "image_stored", store = "local", name = %name, bytes = bytes.len());
        Ok(StoredImage {
            url: format!("{}/{name}", self.base_url),
            public_id: name,
            format: kind.extension.to_string(),
            bytes: bytes.len() as u64,
        })
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn upload(&self, upload: ImageUpload) -> AppResult<StoredImage> {
        self.store(upload.bytes).await
    }

    async fn upload_remote(&self, url: &str) -> AppResult<StoredImage> {
        let response = reqwest::get(url).await?.error_for_status()?;
        let bytes = response.bytes().await?;
        self.store(bytes.to_vec()).await
    }

    async fn delete(&self, public_id: &str) -> AppResult<bool> {
        let path = self.resolve(public_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn public_id_for(&self, url: &str) -> Option<String> {
        let (_, name) = url.split_once(&format!("{UPLOADS_ROUTE}/"))?;
        let name = name.split(['?', '#']).next().unwrap_or(name);
        self.resolve(name).ok().map(|_| name.to_string())
    }
}
