use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::ApiJson;
use crate::images::{sniff, ImageUpload, StoredImage};
use crate::state::AppState;
use crate::{AppError, AppResult};

const FIELD_NAMES: [&str; 2] = ["image", "file"];

/// Accepts one multipart file under `image` (or `file`). Content type is checked from the bytes.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<StoredImage>> {
    while let Some(field) = multipart.next_field().await? {
        if !field.name().is_some_and(|n| FIELD_NAMES.contains(&n)) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?.to_vec();
        sniff(&bytes)?;
        let stored = state.images.upload(ImageUpload { bytes, filename }).await?;
        tracing::info!(
            target: "imobiliaria",
            event = "image_uploaded",
            store = state.images.kind(),
            public_id = %stored.public_id,
            bytes = stored.bytes,
        );
        return Ok(Json(stored));
    }
    Err(AppError::new("UPLOAD/MISSING", "Nenhuma imagem enviada (campo \"image\")"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImageRequest {
    pub public_id: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteImageResponse {
    pub deleted: bool,
}

pub async fn delete_image(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<DeleteImageRequest>,
) -> AppResult<Json<DeleteImageResponse>> {
    let public_id = body
        .public_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| body.url.as_deref().and_then(|u| state.images.public_id_for(u)))
        .ok_or_else(|| {
            AppError::validation(vec!["publicId ou url de uma imagem armazenada é obrigatório".into()])
        })?;
    let deleted = state.images.delete(&public_id).await?;
    tracing::info!(target: "imobiliaria", event = "image_deleted", public_id = %public_id, deleted);
    Ok(Json(DeleteImageResponse { deleted }))
}
