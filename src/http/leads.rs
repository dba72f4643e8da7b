use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{ApiJson, ApiPath, ApiQuery};
use crate::mail::{notify_lead, MAIL_DISABLED_CODE};
use crate::model::{Lead, NovoLead};
use crate::pagination::{PageRequest, Paginated};
use crate::repo::imoveis;
use crate::repo::leads::{self, LeadFiltro, LeadStats};
use crate::state::AppState;
use crate::validation::{exigir, validar_lead};
use crate::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadCriado {
    #[serde(flatten)]
    pub lead: Lead,
    pub email_enviado: bool,
}

/// Persist the lead, then make exactly one notification attempt. Mail failure does not fail the request.
pub async fn criar(
    State(state): State<AppState>,
    ApiJson(novo): ApiJson<NovoLead>,
) -> AppResult<(StatusCode, Json<LeadCriado>)> {
    let novo = novo.normalizado();
    let lead = leads::criar(state.db()?, novo.clone()).await?;
    let recipient = state.config.lead_recipient();
    let email_enviado = notify_lead(
        state.mailer.as_ref(),
        recipient.as_deref(),
        &novo,
        lead.imovel.as_ref(),
    )
    .await;
    Ok((
        StatusCode::CREATED,
        Json(LeadCriado {
            lead,
            email_enviado,
        }),
    ))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvioResponse {
    pub success: bool,
}

/// Notification only: nothing is stored.
pub async fn enviar(
    State(state): State<AppState>,
    ApiJson(novo): ApiJson<NovoLead>,
) -> AppResult<Json<EnvioResponse>> {
    let novo = novo.normalizado();
    exigir(validar_lead(&novo))?;
    if !state.mailer.enabled() {
        return Err(AppError::new(
            MAIL_DISABLED_CODE,
            "Envio de email não configurado",
        ));
    }
    let resumo = match state.db() {
        Ok(db) => imoveis::buscar(db, &novo.imovel_id, false)
            .await
            .ok()
            .flatten()
            .map(|i| i.resumo()),
        Err(_) => None,
    };
    let recipient = state.config.lead_recipient().ok_or_else(|| {
        AppError::new(MAIL_DISABLED_CODE, "Nenhum destinatário configurado para leads")
    })?;
    state
        .mailer
        .send(crate::mail::lead_notification(&recipient, &novo, resumo.as_ref()))
        .await?;
    tracing::info!(target: "imobiliaria", event = "lead_mail_sent", imovel_id = %novo.imovel_id);
    Ok(Json(EnvioResponse { success: true }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListarLeadsQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub visualizado: Option<String>,
    pub imovel_id: Option<String>,
}

impl ListarLeadsQuery {
    fn filtro(&self) -> LeadFiltro {
        let visualizado = match self.visualizado.as_deref().map(str::trim) {
            Some("true" | "1") => Some(true),
            Some("false" | "0") => Some(false),
            _ => None,
        };
        LeadFiltro {
            visualizado,
            imovel_id: self.imovel_id.clone(),
        }
    }

    fn page_request(&self) -> Option<PageRequest> {
        let parse = |v: &Option<String>| v.as_deref().and_then(|v| v.trim().parse().ok());
        PageRequest::from_query(parse(&self.page), parse(&self.limit))
    }
}

pub async fn listar(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListarLeadsQuery>,
) -> AppResult<Json<Paginated<Lead>>> {
    let result = leads::listar(state.db()?, &query.filtro(), query.page_request()).await?;
    Ok(Json(result))
}

pub async fn stats(State(state): State<AppState>) -> AppResult<Json<LeadStats>> {
    Ok(Json(leads::estatisticas(state.db()?).await?))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct MarcarRequest {
    #[serde(default = "default_true")]
    pub visualizado: bool,
}

pub async fn marcar(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<MarcarRequest>,
) -> AppResult<Json<Lead>> {
    Ok(Json(
        leads::marcar_visualizado(state.db()?, id, body.visualizado).await?,
    ))
}
