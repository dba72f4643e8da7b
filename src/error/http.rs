use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use super::AppError;

impl AppError {
    /// HTTP status derived from the error code family.
    pub fn status(&self) -> StatusCode {
        let code = self.code.as_str();
        let family = code.split('/').next().unwrap_or_default();
        match code {
            "AUTH/FORBIDDEN" => return StatusCode::FORBIDDEN,
            "OTP/COOLDOWN" | "OTP/TOO_MANY_ATTEMPTS" => return StatusCode::TOO_MANY_REQUESTS,
            "DB/UNAVAILABLE" | "MAIL/DISABLED" | "IMAGES/DISABLED" => {
                return StatusCode::SERVICE_UNAVAILABLE
            }
            "UPLOAD/TOO_LARGE" => return StatusCode::PAYLOAD_TOO_LARGE,
            "UPLOAD/UNSUPPORTED" => return StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => {}
        }
        if code.ends_with("NOT_FOUND") {
            return StatusCode::NOT_FOUND;
        }
        if code.ends_with("CONFLICT") {
            return StatusCode::CONFLICT;
        }
        match family {
            "VALIDATION" | "JSON" | "UPLOAD" | "REQUEST" => StatusCode::BAD_REQUEST,
            "AUTH" | "OTP" => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing error envelope: `{error, code, details?, incidentId?}`.
    pub fn envelope(&self) -> Value {
        let mut body = Map::new();
        body.insert("error".into(), Value::String(self.message.clone()));
        body.insert("code".into(), Value::String(self.code.clone()));
        if !self.details.is_empty() {
            body.insert("details".into(), json!(self.details));
        }
        if let Some(incident) = &self.incident_id {
            body.insert("incidentId".into(), Value::String(incident.to_string()));
        }
        Value::Object(body)
    }
}

impl IntoResponse for AppError {
    fn into_response(mut self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            self.log_with_event("http_internal_error");
            // Internal messages can carry SQL or driver detail; keep them in the log only.
            let mut public = AppError::new(self.code.clone(), "Erro interno do servidor");
            public.incident_id = self.incident_id.clone();
            return (status, Json(public.envelope())).into_response();
        }
        tracing::warn!(
            target: "imobiliaria",
            event = "http_request_rejected",
            status = status.as_u16(),
            code = %self.code,
            message = %self.message,
        );
        (status, Json(self.envelope())).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::new("JSON/INVALID", rejection.body_text())
            .with_context("status", rejection.status().as_u16().to_string())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::new("REQUEST/INVALID_QUERY", rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::new("REQUEST/INVALID_PATH", rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(error: MultipartError) -> Self {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::new("UPLOAD/TOO_LARGE", "Imagem maior que 10 MB");
        }
        AppError::new("UPLOAD/INVALID", error.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_code_families_to_status() {
        assert_eq!(AppError::validation(vec![]).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::not_found("Lead", "9").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::new("DB/CONFLICT", "dup").status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::db_unavailable().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::new("AUTH/MISSING_TOKEN", "x").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::new("AUTH/FORBIDDEN", "x").status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::new("SQLX/ERROR", "x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn envelope_omits_empty_details() {
        let body = AppError::new("OTP/INVALID", "Código inválido").envelope();
        assert_eq!(body["error"], "Código inválido");
        assert_eq!(body["code"], "OTP/INVALID");
        assert!(body.get("details").is_none());
    }
}
