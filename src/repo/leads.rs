use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{contatos, imoveis, Conditions};
use crate::db::{Database, DbRow, SqlValue};
use crate::mapper::map_row_to_lead;
use crate::model::{Lead, NovoLead};
use crate::pagination::{PageRequest, Paginated};
use crate::time::{now_iso, to_iso};
use crate::validation::{exigir, validar_lead};
use crate::{AppError, AppResult};

const SELECT_COM_IMOVEL: &str = "SELECT l.*, i.titulo AS imovelTitulo, i.tipo AS imovelTipo, \
     i.preco AS imovelPreco FROM leads l LEFT JOIN imoveis i ON i.id = l.imovelId";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadFiltro {
    pub visualizado: Option<bool>,
    pub imovel_id: Option<String>,
}

impl LeadFiltro {
    fn conditions(&self) -> Conditions {
        let mut c = Conditions::default();
        if let Some(v) = self.visualizado {
            c.push("l.visualizado = ?", [v.into()]);
        }
        if let Some(id) = self.imovel_id.as_deref().filter(|id| !id.trim().is_empty()) {
            c.push("l.imovelId = ?", [id.trim().into()]);
        }
        c
    }
}

/// Persist a public lead submission.
///
/// The listing must exist and be active. The submitting client is also recorded
/// in `contatos_cliente`; a failure there is logged and does not reject the lead.
pub async fn criar(db: &Database, novo: NovoLead) -> AppResult<Lead> {
    let novo = novo.normalizado();
    exigir(validar_lead(&novo))?;

    let imovel = imoveis::buscar(db, &novo.imovel_id, false)
        .await?
        .ok_or_else(|| AppError::not_found("Imovel", novo.imovel_id.as_str()))?;

    let agora = now_iso();
    let row = db
        .prepare(
            "INSERT INTO leads (imovelId, clienteNome, clienteTelefone, clienteEmail, mensagem, origem, visualizado, createdAt) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .get(&[
            imovel.id.as_str().into(),
            novo.cliente_nome.as_str().into(),
            novo.cliente_telefone.as_str().into(),
            novo.cliente_email.clone().into(),
            novo.mensagem.clone().unwrap_or_default().into(),
            novo.origem.clone().into(),
            false.into(),
            agora.as_str().into(),
        ])
        .await?;
    let id = row
        .and_then(|r| r.integer("id"))
        .ok_or_else(|| AppError::new("LEAD/INSERT", "Lead inserido sem id"))?;

    if let Err(err) = contatos::registrar(
        db,
        &novo.cliente_nome,
        &novo.cliente_telefone,
        novo.cliente_email.as_deref(),
    )
    .await
    {
        tracing::warn!(target: "imobiliaria", event = "contato_upsert_failed", lead_id = id, error = %err);
    }

    tracing::info!(target: "imobiliaria", event = "lead_created", lead_id = id, imovel_id = %imovel.id);
    Ok(Lead {
        id,
        imovel_id: imovel.id.clone(),
        cliente_nome: novo.cliente_nome,
        cliente_telefone: novo.cliente_telefone,
        cliente_email: novo.cliente_email,
        mensagem: novo.mensagem.unwrap_or_default(),
        origem: novo.origem,
        visualizado: false,
        created_at: agora,
        imovel: Some(imovel.resumo()),
    })
}

pub async fn obter(db: &Database, id: i64) -> AppResult<Lead> {
    let sql = format!("{SELECT_COM_IMOVEL} WHERE l.id = ?");
    db.prepare(&sql)
        .get(&[id.into()])
        .await?
        .as_ref()
        .map(map_row_to_lead)
        .ok_or_else(|| AppError::not_found("Lead", id.to_string()))
}

/// Newest first, each lead carrying a summary of its listing.
pub async fn listar(
    db: &Database,
    filtro: &LeadFiltro,
    page: Option<PageRequest>,
) -> AppResult<Paginated<Lead>> {
    let conditions = filtro.conditions();
    let base = format!(
        "{SELECT_COM_IMOVEL}{} ORDER BY l.createdAt DESC, l.id DESC",
        conditions.sql()
    );

    let Some(page) = page else {
        let rows = db.prepare(&base).all(conditions.params()).await?;
        return Ok(Paginated::full(rows.iter().map(map_row_to_lead).collect()));
    };

    let count_sql = format!("SELECT COUNT(*) AS total FROM leads l{}", conditions.sql());
    let total = db
        .prepare(&count_sql)
        .get(conditions.params())
        .await?
        .and_then(|r| r.integer("total"))
        .unwrap_or(0)
        .max(0) as u64;

    let paged = format!("{base} LIMIT ? OFFSET ?");
    let params = conditions.params_with([
        i64::from(page.limit).into(),
        (page.offset() as i64).into(),
    ]);
    let rows = db.prepare(&paged).all(&params).await?;
    Ok(Paginated::page(
        rows.iter().map(map_row_to_lead).collect(),
        page,
        total,
    ))
}

/// The only mutation a stored lead admits.
pub async fn marcar_visualizado(db: &Database, id: i64, visualizado: bool) -> AppResult<Lead> {
    let res = db
        .prepare("UPDATE leads SET visualizado = ? WHERE id = ?")
        .run(&[visualizado.into(), id.into()])
        .await?;
    if res.rows_affected == 0 {
        return Err(AppError::not_found("Lead", id.to_string()));
    }
    tracing::info!(target: "imobiliaria", event = "lead_marked", lead_id = id, visualizado = visualizado);
    obter(db, id).await
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadsPorImovel {
    pub imovel_id: String,
    pub titulo: String,
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadStats {
    pub total: i64,
    pub nao_visualizados: i64,
    pub hoje: i64,
    pub ultimos_7_dias: i64,
    pub por_imovel: Vec<LeadsPorImovel>,
}

async fn contar(db: &Database, clause: &str, params: &[SqlValue]) -> AppResult<i64> {
    let sql = format!("SELECT COUNT(*) AS total FROM leads{clause}");
    Ok(db
        .prepare(&sql)
        .get(params)
        .await?
        .and_then(|r| r.integer("total"))
        .unwrap_or(0))
}

fn por_imovel(row: &DbRow) -> Option<LeadsPorImovel> {
    Some(LeadsPorImovel {
        imovel_id: row.text("imovelId")?,
        titulo: row.text("titulo").unwrap_or_default(),
        total: row.integer("total").unwrap_or(0),
    })
}

pub async fn estatisticas(db: &Database) -> AppResult<LeadStats> {
    let agora = Utc::now();
    let inicio_do_dia = agora
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|d| to_iso(d.and_utc()))
        .unwrap_or_else(|| to_iso(agora));
    let semana = to_iso(agora - Duration::days(7));

    let por_imovel = db
        .prepare(
            "SELECT l.imovelId AS imovelId, i.titulo AS titulo, COUNT(*) AS total \
             FROM leads l LEFT JOIN imoveis i ON i.id = l.imovelId \
             GROUP BY l.imovelId, i.titulo ORDER BY total DESC, l.imovelId ASC LIMIT 5",
        )
        .all(&[])
        .await?
        .iter()
        .filter_map(por_imovel)
        .collect();

    Ok(LeadStats {
        total: contar(db, "", &[]).await?,
        nao_visualizados: contar(db, " WHERE visualizado = ?", &[false.into()]).await?,
        hoje: contar(db, " WHERE createdAt >= ?", &[inicio_do_dia.into()]).await?,
        ultimos_7_dias: contar(db, " WHERE createdAt >= ?", &[semana.into()]).await?,
        por_imovel,
    })
}
