use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};

use super::{is_cloudinary_url, public_id_from_url, sniff, ImageStore, ImageUpload, StoredImage};
use crate::config::CloudinaryConfig;
use crate::{AppError, AppResult};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Signature over the request parameters: `k=v` pairs sorted by key, joined
/// with `&`, followed by the API secret, SHA-1 hex encoded.
pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha1::digest(format!("{joined}{api_secret}").as_bytes()))
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    bytes: u64,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

#[derive(Debug, Clone)]
pub struct CloudinaryStore {
    cfg: CloudinaryConfig,
    http: reqwest::Client,
    api_base: String,
}

impl CloudinaryStore {
    pub fn new(cfg: CloudinaryConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            cfg,
            http,
            api_base: API_BASE.to_string(),
        })
    }

    /// Point at another API host (test doubles).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{action}", self.api_base, self.cfg.cloud_name)
    }

    fn signed_form(&self, extra: &[(&str, &str)]) -> Form {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let mut params: Vec<(&str, &str)> = extra.to_vec();
        let folder = self.cfg.folder.clone().unwrap_or_default();
        if !folder.is_empty() && !extra.iter().any(|(k, _)| *k == "public_id") {
            params.push(("folder", folder.as_str()));
        }
        params.push(("timestamp", timestamp.as_str()));
        let signature = sign(&params, &self.cfg.api_secret);

        let mut form = Form::new()
            .text("api_key", self.cfg.api_key.clone())
            .text("signature", signature);
        for (k, v) in params {
            form = form.text(k.to_string(), v.to_string());
        }
        form
    }

    async fn post(&self, action: &str, form: Form) -> AppResult<reqwest::Response> {
        let response = self.http.post(self.endpoint(action)).multipart(form).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error.message)
            .unwrap_or_else(|_| status.to_string());
        Err(AppError::new("IMAGES/PROVIDER", message)
            .with_context("status", status.as_u16().to_string())
            .with_context("action", action))
    }

    async fn finish_upload(&self, form: Form) -> AppResult<StoredImage> {
        let body: UploadResponse = self.post("upload", form).await?.json().await?;
        tracing::info!(
            target: "imobiliaria",
            event = "image_stored",
            store = "cloudinary",
            public_id = %body.public_id,
            bytes = body.bytes,
        );
        Ok(StoredImage {
            url: body.secure_url,
            public_id: body.public_id,
            format: body.format,
            bytes: body.bytes,
        })
    }
}

#[async_trait]
impl ImageStore for CloudinaryStore {
    fn kind(&self) -> &'static str {
        "cloudinary"
    }

    async fn upload(&self, upload: ImageUpload) -> AppResult<StoredImage> {
        let kind = sniff(&upload.bytes)?;
        let filename = upload
            .filename
            .unwrap_or_else(|| format!("imagem.{}", kind.extension));
        let part = Part::bytes(upload.bytes)
            .file_name(filename)
            .mime_str(kind.mime)?;
        let form = self.signed_form(&[]).part("file", part);
        self.finish_upload(form).await
    }

    async fn upload_remote(&self, url: &str) -> AppResult<StoredImage> {
        let form = self.signed_form(&[]).text("file", url.to_string());
        self.finish_upload(form).await
    }

    async fn delete(&self, public_id: &str) -> AppResult<bool> {
        let form = self.signed_form(&[("public_id", public_id)]);
        let body: DestroyResponse = self.post("destroy", form).await?.json().await?;
        tracing::info!(target: "imobiliaria", event = "image_deleted", store = "cloudinary", public_id = %public_id, result = %body.result);
        Ok(body.result == "ok")
    }

    fn public_id_for(&self, url: &str) -> Option<String> {
        if !is_cloudinary_url(url) {
            return None;
        }
        public_id_from_url(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_sorts_and_skips_empty_params() {
        let a = sign(&[("timestamp", "1315060510"), ("public_id", "sample")], "abcd");
        let b = sign(
            &[("public_id", "sample"), ("folder", ""), ("timestamp", "1315060510")],
            "abcd",
        );
        assert_eq!(a, b);
        assert_eq!(a, hex::encode(Sha1::digest(b"public_id=sample&timestamp=1315060510abcd")));
    }

    #[test]
    fn only_cloudinary_urls_have_ids() {
        let store = CloudinaryStore::new(CloudinaryConfig {
            cloud_name: "demo".into(),
            api_key: "k".into(),
            api_secret: "s".into(),
            folder: Some("imoveis".into()),
        })
        .expect("client");
        assert_eq!(
            store.public_id_for("https://res.cloudinary.com/demo/image/upload/v1/imoveis/a.jpg"),
            Some("imoveis/a".to_string())
        );
        assert_eq!(store.public_id_for("http://localhost:3001/uploads/a.jpg"), None);
        assert!(store.endpoint("upload").ends_with("/demo/image/upload"));
    }
}
