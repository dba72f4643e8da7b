//! Typed client for the listing API, plus the list state a catalog view drives.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::token::expires_at;
use crate::http::admin::{SendOtpResponse, ValidateOtpResponse};
use crate::http::imoveis::{ExcluirResponse, NextIdResponse};
use crate::http::leads::LeadCriado;
use crate::images::StoredImage;
use crate::model::{Imovel, Lead, NovoLead};
use crate::pagination::{PageRequest, Paginated};
use crate::repo::imoveis::Facetas;
use crate::repo::leads::LeadStats;
use crate::{AppError, AppResult};

pub mod contato;
pub mod list_state;

pub use contato::ContatoLocal;
pub use list_state::{ListState, LoadStatus, Ticket};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Catalog filters as sent on the query string.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogoFiltro {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoria: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bairro: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preco_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preco_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quartos_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busca: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordenacao: Option<String>,
}

/// Older deployments answer list endpoints with a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Envelope(Paginated<T>),
    Array(Vec<T>),
}

impl<T> From<ListBody<T>> for Paginated<T> {
    fn from(body: ListBody<T>) -> Self {
        match body {
            ListBody::Envelope(page) => page,
            ListBody::Array(data) => Paginated::full(data),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Vec<String>,
}

/// Admin session held by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub email: String,
    /// Unix seconds.
    pub expires_at: i64,
}

impl Session {
    pub fn from_token(token: String, email: String, now_secs: i64) -> Self {
        let expires_at = expires_at(&token, now_secs);
        Self {
            token,
            email,
            expires_at,
        }
    }

    pub fn is_expired(&self, now_secs: i64) -> bool {
        now_secs >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Option<Session>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> AppResult<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, session: Option<Session>) {
        self.session = session;
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match &self.session {
            Some(session) if !session.is_expired(chrono::Utc::now().timestamp()) => {
                builder.bearer_auth(&session.token)
            }
            _ => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> AppResult<T> {
        let response = builder.send().await?;
        decode(response).await
    }

    pub async fn listar_imoveis(
        &self,
        filtro: &CatalogoFiltro,
        page: Option<PageRequest>,
    ) -> AppResult<Paginated<Imovel>> {
        let mut builder = self.request(Method::GET, "/api/imoveis").query(filtro);
        if let Some(page) = page {
            builder = builder.query(&[("page", page.page), ("limit", page.limit)]);
        }
        let body: ListBody<Imovel> = self.send(builder).await?;
        Ok(body.into())
    }

    pub async fn facetas(&self) -> AppResult<Facetas> {
        self.send(self.request(Method::GET, "/api/imoveis/facets"))
            .await
    }

    pub async fn obter_imovel(&self, id: &str) -> AppResult<Imovel> {
        self.send(self.request(Method::GET, &format!("/api/imoveis/{id}")))
            .await
    }

    pub async fn proximo_id(&self, tipo: &str) -> AppResult<String> {
        let builder = self
            .request(Method::GET, "/api/imoveis/next-id")
            .query(&[("tipo", tipo)]);
        let body: NextIdResponse = self.send(builder).await?;
        Ok(body.id)
    }

    pub async fn criar_imovel(&self, imovel: &Imovel) -> AppResult<Imovel> {
        self.send(self.request(Method::POST, "/api/imoveis").json(imovel))
            .await
    }

    pub async fn atualizar_imovel(&self, id: &str, imovel: &Imovel) -> AppResult<Imovel> {
        let builder = self
            .request(Method::PUT, &format!("/api/imoveis/{id}"))
            .json(imovel);
        self.send(builder).await
    }

    pub async fn excluir_imovel(&self, id: &str) -> AppResult<ExcluirResponse> {
        self.send(self.request(Method::DELETE, &format!("/api/imoveis/{id}")))
            .await
    }

    pub async fn enviar_imagem(&self, bytes: Vec<u8>, filename: &str) -> AppResult<StoredImage> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("image", part);
        self.send(self.request(Method::POST, "/api/upload-image").multipart(form))
            .await
    }

    pub async fn criar_lead(&self, lead: &NovoLead) -> AppResult<LeadCriado> {
        self.send(self.request(Method::POST, "/api/leads").json(lead))
            .await
    }

    pub async fn listar_leads(&self, page: Option<PageRequest>) -> AppResult<Paginated<Lead>> {
        let mut builder = self.request(Method::GET, "/api/leads");
        if let Some(page) = page {
            builder = builder.query(&[("page", page.page), ("limit", page.limit)]);
        }
        let body: ListBody<Lead> = self.send(builder).await?;
        Ok(body.into())
    }

    pub async fn estatisticas_leads(&self) -> AppResult<LeadStats> {
        self.send(self.request(Method::GET, "/api/leads/stats"))
            .await
    }

    pub async fn marcar_lead(&self, id: i64, visualizado: bool) -> AppResult<Lead> {
        let builder = self
            .request(Method::PATCH, &format!("/api/leads/{id}"))
            .json(&serde_json::json!({ "visualizado": visualizado }));
        self.send(builder).await
    }

    pub async fn solicitar_codigo(&self, email: &str) -> AppResult<SendOtpResponse> {
        let builder = self
            .request(Method::POST, "/api/admin/send-otp")
            .json(&serde_json::json!({ "email": email }));
        self.send(builder).await
    }

    /// Exchange a code for a token and keep the session for later admin calls.
    pub async fn entrar(&mut self, email: &str, codigo: &str) -> AppResult<&Session> {
        let builder = self
            .request(Method::POST, "/api/admin/validate-otp")
            .json(&serde_json::json!({ "email": email, "otp": codigo }));
        let body: ValidateOtpResponse = self.send(builder).await?;
        let session = Session::from_token(body.token, body.email, chrono::Utc::now().timestamp());
        Ok(self.session.insert(session))
    }

    pub fn sair(&mut self) {
        self.session = None;
    }
}

/// Success bodies decode into `T`; error bodies become the server's `AppError`.
async fn decode<T: DeserializeOwned>(response: Response) -> AppResult<T> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if status.is_success() {
        return Ok(serde_json::from_slice(&bytes)?);
    }
    let error = match serde_json::from_slice::<ErrorBody>(&bytes) {
        Ok(body) => {
            let mut err = AppError::new(
                body.code.unwrap_or_else(|| "HTTP/ERROR".to_string()),
                body.error,
            );
            err.details = body.details;
            err
        }
        Err(_) => AppError::new("HTTP/ERROR", String::from_utf8_lossy(&bytes).into_owned()),
    };
    Err(error.with_context("status", status.as_u16().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_bodies_become_full_pages() {
        let body: ListBody<Lead> = serde_json::from_str("[]").expect("array");
        let page: Paginated<Lead> = body.into();
        assert!(page.data.is_empty());
        assert!(page.pagination.is_none());

        let body: ListBody<Lead> = serde_json::from_str(
            r#"{"data":[],"pagination":{"page":2,"limit":12,"total":13,"totalPages":2,"hasNextPage":false,"hasPrevPage":true}}"#,
        )
        .expect("envelope");
        let page: Paginated<Lead> = body.into();
        assert_eq!(page.pagination.map(|p| p.page), Some(2));
    }

    #[test]
    fn session_expiry_falls_back_to_one_hour() {
        let session = Session::from_token("nao-e-jwt".into(), "a@b.com".into(), 1_000);
        assert_eq!(session.expires_at, 1_000 + crate::auth::token::TOKEN_TTL_SECS);
        assert!(!session.is_expired(1_000));
        assert!(session.is_expired(1_000 + 3_600));
    }

    #[test]
    fn filters_skip_absent_values() {
        let filtro = CatalogoFiltro {
            cidade: Some("Campinas".into()),
            preco_max: Some(500000.0),
            ..CatalogoFiltro::default()
        };
        let value = serde_json::to_value(&filtro).expect("json");
        assert_eq!(value["cidade"], "Campinas");
        assert_eq!(value["precoMax"], 500000.0);
        assert!(value.get("tipo").is_none());
    }
}
