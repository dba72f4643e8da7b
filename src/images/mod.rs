//! Listing photo storage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

pub mod cloudinary;
pub mod local;

pub use cloudinary::CloudinaryStore;
pub use local::LocalImageStore;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const ALLOWED_MIME: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    pub url: String,
    pub public_id: String,
    pub format: String,
    pub bytes: u64,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn upload(&self, upload: ImageUpload) -> AppResult<StoredImage>;

    /// Store an image that currently lives at `url`.
    async fn upload_remote(&self, url: &str) -> AppResult<StoredImage>;

    /// Remove an image. `Ok(false)` when it was already gone.
    async fn delete(&self, public_id: &str) -> AppResult<bool>;

    /// Public id of `url` when this store holds it.
    fn public_id_for(&self, url: &str) -> Option<String>;
}

/// Validated image content type, detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageKind {
    pub mime: &'static str,
    pub extension: &'static str,
}

pub fn sniff(bytes: &[u8]) -> AppResult<ImageKind> {
    if bytes.is_empty() {
        return Err(AppError::new("UPLOAD/EMPTY", "Arquivo de imagem vazio"));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::new("UPLOAD/TOO_LARGE", "Imagem maior que 10 MB")
            .with_context("bytes", bytes.len().to_string()));
    }
    let detected = infer::get(bytes)
        .filter(|kind| ALLOWED_MIME.contains(&kind.mime_type()))
        .ok_or_else(|| {
            AppError::new(
                "UPLOAD/UNSUPPORTED",
                "Formato não suportado. Envie JPEG, PNG, WebP ou GIF",
            )
        })?;
    Ok(ImageKind {
        mime: detected.mime_type(),
        extension: detected.extension(),
    })
}

/// Cloudinary public id embedded in a delivery URL:
/// `.../image/upload/[transformations/][v123/]folder/name.ext` → `folder/name`.
pub fn public_id_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/upload/")?;
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let start = segments
        .iter()
        .position(|s| is_version(s))
        .map(|i| i + 1)
        .unwrap_or(0);
    let path = segments.get(start..)?.join("/");
    let id = match path.rsplit_once('.') {
        Some((stem, ext)) if !ext.contains('/') => stem.to_string(),
        _ => path,
    };
    (!id.is_empty()).then_some(id)
}

fn is_version(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].bytes().all(|b| b.is_ascii_digit())
}

pub fn is_cloudinary_url(url: &str) -> bool {
    url.contains("res.cloudinary.com/")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn sniff_detects_by_content() {
        let kind = sniff(PNG).expect("png");
        assert_eq!(kind.mime, "image/png");
        assert_eq!(kind.extension, "png");
    }

    #[test]
    fn sniff_rejects_other_content() {
        assert_eq!(sniff(b"%PDF-1.7 hello").expect_err("pdf").code(), "UPLOAD/UNSUPPORTED");
        assert_eq!(sniff(b"").expect_err("empty").code(), "UPLOAD/EMPTY");
        let big = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert_eq!(sniff(&big).expect_err("big").code(), "UPLOAD/TOO_LARGE");
    }

    #[test]
    fn public_id_extraction() {
        assert_eq!(
            public_id_from_url(
                "https://res.cloudinary.com/demo/image/upload/v1712345678/imoveis/ca001_1.jpg"
            )
            .as_deref(),
            Some("imoveis/ca001_1")
        );
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/w_400,c_fill/v1/x.webp?a=1")
                .as_deref(),
            Some("x")
        );
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/sample.png").as_deref(),
            Some("sample")
        );
        assert_eq!(public_id_from_url("https://exemplo.com/foto.jpg"), None);
    }
}
