use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::admin::optional_admin;
use super::{ApiJson, ApiPath, ApiQuery};
use crate::id::gerar_proximo_id;
use crate::model::Imovel;
use crate::pagination::{PageRequest, Paginated};
use crate::repo::imoveis::{self, Facetas, ImovelFiltro, Ordenacao};
use crate::state::AppState;
use crate::{AppError, AppResult};

/// Catalog query string. Every value arrives as text and malformed numbers are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListarQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub categoria: Option<String>,
    pub tipo: Option<String>,
    pub cidade: Option<String>,
    pub bairro: Option<String>,
    pub preco_min: Option<String>,
    pub preco_max: Option<String>,
    pub quartos_min: Option<String>,
    pub busca: Option<String>,
    pub ordenacao: Option<String>,
    pub incluir_inativos: Option<String>,
}

fn parse<T: std::str::FromStr>(value: &Option<String>) -> Option<T> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}

fn flag(value: &Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::trim),
        Some("true" | "1" | "sim")
    )
}

impl ListarQuery {
    pub fn page_request(&self) -> Option<PageRequest> {
        PageRequest::from_query(parse(&self.page), parse(&self.limit))
    }

    /// Inactive listings are only visible to an authenticated admin who asks for them.
    pub fn filtro(&self, admin: bool) -> ImovelFiltro {
        ImovelFiltro {
            categoria: self.categoria.clone(),
            tipo: self.tipo.clone(),
            cidade: self.cidade.clone(),
            bairro: self.bairro.clone(),
            preco_min: parse(&self.preco_min),
            preco_max: parse(&self.preco_max),
            quartos_min: parse(&self.quartos_min),
            busca: self.busca.clone(),
            ordenacao: self
                .ordenacao
                .as_deref()
                .map(Ordenacao::parse)
                .unwrap_or_default(),
            incluir_inativos: admin && flag(&self.incluir_inativos),
        }
    }
}

fn para_publico(imovel: Imovel, admin: bool) -> Imovel {
    if admin {
        imovel
    } else {
        imovel.publico()
    }
}

pub async fn listar(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<ListarQuery>,
) -> AppResult<Json<Paginated<Imovel>>> {
    let admin = optional_admin(&state, &headers).is_some();
    let db = state.db()?;
    let mut result = imoveis::listar(db, &query.filtro(admin), query.page_request()).await?;
    result.data = result
        .data
        .into_iter()
        .map(|i| para_publico(i, admin))
        .collect();
    Ok(Json(result))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetasQuery {
    pub incluir_inativos: Option<String>,
}

pub async fn facetas(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<FacetasQuery>,
) -> AppResult<Json<Facetas>> {
    let admin = optional_admin(&state, &headers).is_some();
    let incluir = admin && flag(&query.incluir_inativos);
    Ok(Json(imoveis::facetas(state.db()?, incluir).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct NextIdQuery {
    #[serde(default)]
    pub tipo: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextIdResponse {
    pub id: String,
}

pub async fn next_id(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<NextIdQuery>,
) -> AppResult<Json<NextIdResponse>> {
    let id = gerar_proximo_id(state.db()?, &query.tipo).await?;
    Ok(Json(NextIdResponse { id }))
}

pub async fn obter(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<Imovel>> {
    let admin = optional_admin(&state, &headers).is_some();
    let imovel = imoveis::buscar(state.db()?, &id, admin)
        .await?
        .ok_or_else(|| AppError::not_found("Imovel", id.as_str()))?;
    Ok(Json(para_publico(imovel, admin)))
}

pub async fn criar(
    State(state): State<AppState>,
    ApiJson(imovel): ApiJson<Imovel>,
) -> AppResult<(StatusCode, Json<Imovel>)> {
    let criado = imoveis::criar(state.db()?, imovel).await?;
    Ok((StatusCode::CREATED, Json(criado)))
}

pub async fn atualizar(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(imovel): ApiJson<Imovel>,
) -> AppResult<Json<Imovel>> {
    Ok(Json(imoveis::atualizar(state.db()?, &id, imovel).await?))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcluirResponse {
    pub ok: bool,
    pub id: String,
    pub fotos_removidas: usize,
}

/// Delete a listing and its leads. Stored photos are removed afterwards on a best-effort basis.
pub async fn excluir(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<ExcluirResponse>> {
    let removido = imoveis::excluir(state.db()?, &id).await?;

    let mut fotos_removidas = 0;
    for foto in &removido.fotos {
        let Some(public_id) = foto
            .public_id
            .clone()
            .or_else(|| state.images.public_id_for(&foto.url))
        else {
            continue;
        };
        match state.images.delete(&public_id).await {
            Ok(true) => fotos_removidas += 1,
            Ok(false) => {}
            Err(err) => tracing::warn!(
                target: "imobiliaria",
                event = "image_delete_failed",
                imovel_id = %removido.id,
                public_id = %public_id,
                code = %err.code,
            ),
        }
    }

    tracing::info!(
        target: "imobiliaria",
        event = "imovel_photos_removed",
        id = %removido.id,
        fotos_removidas,
    );
    Ok(Json(ExcluirResponse {
        ok: true,
        id: removido.id,
        fotos_removidas,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> ListarQuery {
        let value: serde_json::Map<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        serde_json::from_value(serde_json::Value::Object(value)).expect("query")
    }

    #[test]
    fn malformed_numbers_are_ignored() {
        let q = query(&[("precoMin", "abc"), ("quartosMin", "2"), ("page", "x")]);
        let filtro = q.filtro(false);
        assert_eq!(filtro.preco_min, None);
        assert_eq!(filtro.quartos_min, Some(2));
        assert_eq!(q.page_request(), None);
    }

    #[test]
    fn inactive_listings_require_admin() {
        let q = query(&[("incluirInativos", "true")]);
        assert!(!q.filtro(false).incluir_inativos);
        assert!(q.filtro(true).incluir_inativos);
    }

    #[test]
    fn ordering_defaults_to_newest() {
        assert_eq!(query(&[]).filtro(false).ordenacao, Ordenacao::DataDesc);
        assert_eq!(
            query(&[("ordenacao", "preco_asc")]).filtro(false).ordenacao,
            Ordenacao::PrecoAsc
        );
    }

    #[test]
    fn public_copy_hides_owner() {
        let mut imovel = Imovel::default();
        imovel.proprietario.nome = "Dona".into();
        assert!(para_publico(imovel.clone(), false).proprietario.is_empty());
        assert_eq!(para_publico(imovel, true).proprietario.nome, "Dona");
    }
}
