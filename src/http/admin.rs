use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use super::ApiJson;
use crate::auth::token::bearer;
use crate::auth::Claims;
use crate::mail::{otp_email, MAIL_DISABLED_CODE};
use crate::state::AppState;
use crate::time::to_iso;
use crate::{AppError, AppResult};

fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<Claims> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = bearer(header)?;
    state.auth.autenticar(token)
}

/// Admin-only routes: a valid token's claims are placed in the request extensions.
pub async fn require_admin(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    match authenticate(&state, request.headers()) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Claims for public routes that show more to an authenticated admin.
pub fn optional_admin(state: &AppState, headers: &HeaderMap) -> Option<Claims> {
    if !headers.contains_key(AUTHORIZATION) {
        return None;
    }
    authenticate(state, headers).ok()
}

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    pub success: bool,
    pub message: String,
}

pub async fn send_otp(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SendOtpRequest>,
) -> AppResult<Json<SendOtpResponse>> {
    if !state.mailer.enabled() {
        return Err(AppError::new(
            MAIL_DISABLED_CODE,
            "Envio de email não configurado; login indisponível",
        ));
    }
    let email = body.email.trim().to_lowercase();
    let code = state.auth.solicitar_codigo(&email)?;
    if let Err(err) = state.mailer.send(otp_email(&email, &code)).await {
        // An undelivered code must not hold the resend cooldown.
        state.auth.cancelar_codigo(&email);
        tracing::warn!(target: "imobiliaria", event = "otp_send_failed", code = %err.code);
        return Err(err);
    }
    tracing::info!(target: "imobiliaria", event = "otp_sent");
    Ok(Json(SendOtpResponse {
        success: true,
        message: "Código enviado para o email informado".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ValidateOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "code", alias = "codigo")]
    pub otp: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateOtpResponse {
    pub token: String,
    pub email: String,
    pub expires_at: String,
}

pub async fn validate_otp(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ValidateOtpRequest>,
) -> AppResult<Json<ValidateOtpResponse>> {
    let (token, claims) = state.auth.validar_codigo(&body.email, &body.otp)?;
    let expires_at = chrono::DateTime::from_timestamp(claims.exp, 0)
        .map(to_iso)
        .unwrap_or_default();
    Ok(Json(ValidateOtpResponse {
        token,
        email: claims.sub,
        expires_at,
    }))
}

pub async fn me(Extension(claims): Extension<Claims>) -> Json<Claims> {
    Json(claims)
}
