use serde::{Deserialize, Serialize};

use super::{like_pattern, Conditions};
use crate::area::para_metros_quadrados;
use crate::db::{BatchStatement, Database, DbRow, SqlValue};
use crate::id::gerar_proximo_id;
use crate::mapper::{map_row_to_imovel, serialize_fotos, ImovelRow};
use crate::model::{normalizar_fotos, Foto, Imovel};
use crate::pagination::{PageRequest, Paginated};
use crate::text::chave_opcional;
use crate::time::now_iso;
use crate::validation::{exigir, validar_imovel};
use crate::{AppError, AppResult};

/// Attempts at allocate-then-insert before a primary-key conflict is surfaced.
pub const ID_ATTEMPTS: u32 = 5;
const CONFLICT_CODE: &str = "DB/CONFLICT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ordenacao {
    #[default]
    DataDesc,
    DataAsc,
    PrecoAsc,
    PrecoDesc,
}

impl Ordenacao {
    /// Unknown values fall back to newest first.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "data_asc" => Ordenacao::DataAsc,
            "preco_asc" => Ordenacao::PrecoAsc,
            "preco_desc" => Ordenacao::PrecoDesc,
            _ => Ordenacao::DataDesc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Ordenacao::DataDesc => "data_desc",
            Ordenacao::DataAsc => "data_asc",
            Ordenacao::PrecoAsc => "preco_asc",
            Ordenacao::PrecoDesc => "preco_desc",
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            Ordenacao::DataDesc => "createdAt DESC, id DESC",
            Ordenacao::DataAsc => "createdAt ASC, id ASC",
            Ordenacao::PrecoAsc => "preco ASC, createdAt DESC",
            Ordenacao::PrecoDesc => "preco DESC, createdAt DESC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImovelFiltro {
    pub categoria: Option<String>,
    pub tipo: Option<String>,
    pub cidade: Option<String>,
    pub bairro: Option<String>,
    pub preco_min: Option<f64>,
    pub preco_max: Option<f64>,
    pub quartos_min: Option<i64>,
    pub busca: Option<String>,
    pub ordenacao: Ordenacao,
    pub incluir_inativos: bool,
}

impl ImovelFiltro {
    fn conditions(&self) -> Conditions {
        let mut c = Conditions::default();
        if !self.incluir_inativos {
            c.push("ativo = ?", [true.into()]);
        }
        let exatos = [
            ("categoriaChave", &self.categoria),
            ("tipoChave", &self.tipo),
            ("cidadeChave", &self.cidade),
            ("bairroChave", &self.bairro),
        ];
        for (coluna, valor) in exatos {
            if let Some(v) = valor.as_deref().and_then(chave_opcional) {
                c.push(format!("{coluna} = ?"), [v.into()]);
            }
        }
        if let Some(min) = self.preco_min {
            c.push("preco >= ?", [min.into()]);
        }
        if let Some(max) = self.preco_max {
            c.push("preco <= ?", [max.into()]);
        }
        if let Some(q) = self.quartos_min {
            c.push("quartos >= ?", [q.into()]);
        }
        if let Some(busca) = self.busca.as_deref().filter(|b| !b.trim().is_empty()) {
            c.push("buscaChave LIKE ?", [like_pattern(busca).into()]);
        }
        c
    }
}

pub async fn listar(
    db: &Database,
    filtro: &ImovelFiltro,
    page: Option<PageRequest>,
) -> AppResult<Paginated<Imovel>> {
    let conditions = filtro.conditions();
    let base = format!(
        "SELECT * FROM imoveis{} ORDER BY {}",
        conditions.sql(),
        filtro.ordenacao.order_by()
    );

    let Some(page) = page else {
        let rows = db.prepare(&base).all(conditions.params()).await?;
        return Ok(Paginated::full(rows.iter().map(map_row_to_imovel).collect()));
    };

    let count_sql = format!("SELECT COUNT(*) AS total FROM imoveis{}", conditions.sql());
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
        rows.iter().map(map_row_to_imovel).collect(),
        page,
        total,
    ))
}

pub async fn buscar(db: &Database, id: &str, incluir_inativos: bool) -> AppResult<Option<Imovel>> {
    let sql = if incluir_inativos {
        "SELECT * FROM imoveis WHERE id = ?"
    } else {
        "SELECT * FROM imoveis WHERE id = ? AND ativo = ?"
    };
    let mut params: Vec<SqlValue> = vec![id.trim().into()];
    if !incluir_inativos {
        params.push(true.into());
    }
    Ok(db.prepare(sql).get(&params).await?.as_ref().map(map_row_to_imovel))
}

pub async fn obter(db: &Database, id: &str) -> AppResult<Imovel> {
    buscar(db, id, true)
        .await?
        .ok_or_else(|| AppError::not_found("Imovel", id))
}

fn preparar(imovel: &mut Imovel) {
    normalizar_fotos(&mut imovel.fotos);
    if let Some(rural) = imovel.rural.as_mut() {
        rural.area_metros_quadrados = rural
            .area_alqueires
            .map(|a| para_metros_quadrados(a, rural.tipo_alqueire.unwrap_or_default()));
    }
}

fn insert_sql() -> String {
    let cols = ImovelRow::COLUMNS;
    format!(
        "INSERT INTO imoveis ({}) VALUES ({})",
        cols.join(", "),
        vec!["?"; cols.len()].join(", ")
    )
}

fn update_sql() -> String {
    let sets: Vec<String> = ImovelRow::COLUMNS
        .iter()
        .filter(|c| !matches!(**c, "id" | "createdAt"))
        .map(|c| format!("{c} = ?"))
        .collect();
    format!("UPDATE imoveis SET {} WHERE id = ?", sets.join(", "))
}

/// Create a listing with a server-assigned ID.
///
/// Allocation and insert are not atomic; a concurrent create can take the same
/// ID first, in which case a fresh ID is allocated and the insert repeated.
pub async fn criar(db: &Database, mut imovel: Imovel) -> AppResult<Imovel> {
    exigir(validar_imovel(&imovel))?;
    preparar(&mut imovel);
    let agora = now_iso();
    imovel.created_at = agora.clone();
    imovel.updated_at = agora;

    let sql = insert_sql();
    let mut attempt = 1;
    loop {
        imovel.id = gerar_proximo_id(db, &imovel.tipo).await?;
        let params = ImovelRow::from(&imovel).to_params();
        match db.prepare(&sql).run(&params).await {
            Ok(_) => {
                tracing::info!(target: "imobiliaria", event = "imovel_created", id = %imovel.id, attempt = attempt);
                return obter(db, &imovel.id).await;
            }
            Err(err) if err.code() == CONFLICT_CODE && attempt < ID_ATTEMPTS => {
                tracing::warn!(
                    target: "imobiliaria",
                    event = "imovel_id_conflict",
                    id = %imovel.id,
                    attempt = attempt,
                );
                attempt += 1;
            }
            Err(err) => return Err(err.with_context("id", imovel.id.clone())),
        }
    }
}

/// Full replace. `id` and `createdAt` are kept from the stored row.
pub async fn atualizar(db: &Database, id: &str, mut imovel: Imovel) -> AppResult<Imovel> {
    exigir(validar_imovel(&imovel))?;
    let atual = obter(db, id).await?;
    preparar(&mut imovel);
    imovel.id = atual.id;
    imovel.created_at = atual.created_at;
    imovel.updated_at = now_iso();

    let row = ImovelRow::from(&imovel);
    let mut params: Vec<SqlValue> = ImovelRow::COLUMNS
        .iter()
        .zip(row.to_params())
        .filter(|(c, _)| !matches!(**c, "id" | "createdAt"))
        .map(|(_, v)| v)
        .collect();
    params.push(imovel.id.clone().into());

    let res = db.prepare(&update_sql()).run(&params).await?;
    if res.rows_affected == 0 {
        return Err(AppError::not_found("Imovel", id));
    }
    tracing::info!(target: "imobiliaria", event = "imovel_updated", id = %imovel.id);
    obter(db, &imovel.id).await
}

pub async fn atualizar_fotos(db: &Database, id: &str, fotos: &[Foto]) -> AppResult<()> {
    let res = db
        .prepare("UPDATE imoveis SET fotos = ?, updatedAt = ? WHERE id = ?")
        .run(&[serialize_fotos(fotos).into(), now_iso().into(), id.into()])
        .await?;
    if res.rows_affected == 0 {
        return Err(AppError::not_found("Imovel", id));
    }
    Ok(())
}

/// Hard delete. Leads and the listing go in one transaction, so either both are
/// removed or neither is. The removed listing is returned so the caller can
/// clean up its photos.
pub async fn excluir(db: &Database, id: &str) -> AppResult<Imovel> {
    let atual = obter(db, id).await?;
    let chave: SqlValue = atual.id.as_str().into();
    let resultados = db
        .transaction(&[
            BatchStatement::new("DELETE FROM leads WHERE imovelId = ?", vec![chave.clone()]),
            BatchStatement::new("DELETE FROM imoveis WHERE id = ?", vec![chave]),
        ])
        .await?;
    if resultados.get(1).map_or(0, |r| r.rows_affected) == 0 {
        return Err(AppError::not_found("Imovel", id));
    }
    tracing::info!(
        target: "imobiliaria",
        event = "imovel_deleted",
        id = %atual.id,
        leads_removed = resultados[0].rows_affected,
    );
    Ok(atual)
}

/// Fill the folded key columns of rows written before they existed.
pub async fn reindexar_chaves(db: &Database) -> AppResult<u64> {
    let rows = db
        .prepare("SELECT * FROM imoveis WHERE buscaChave IS NULL")
        .all(&[])
        .await?;
    let mut total = 0;
    for row in &rows {
        let flat = ImovelRow::from(&map_row_to_imovel(row));
        let Some(id) = flat.id.clone() else { continue };
        total += db
            .prepare(
                "UPDATE imoveis SET buscaChave = ?, categoriaChave = ?, tipoChave = ?, \
                 cidadeChave = ?, bairroChave = ? WHERE id = ?",
            )
            .run(&[
                flat.busca_chave.into(),
                flat.categoria_chave.into(),
                flat.tipo_chave.into(),
                flat.cidade_chave.into(),
                flat.bairro_chave.into(),
                id.into(),
            ])
            .await?
            .rows_affected;
    }
    if total > 0 {
        tracing::info!(target: "imobiliaria", event = "imovel_keys_backfilled", rows = total);
    }
    Ok(total)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contagem {
    pub valor: String,
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facetas {
    pub total: i64,
    pub categorias: Vec<Contagem>,
    pub tipos: Vec<Contagem>,
    pub cidades: Vec<Contagem>,
    pub bairros: Vec<Contagem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preco_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preco_max: Option<f64>,
}

fn contagem(row: &DbRow) -> Option<Contagem> {
    Some(Contagem {
        valor: row.text("valor")?,
        total: row.integer("total").unwrap_or(0),
    })
}

/// Counts per filterable column plus the price range, for the catalog sidebar.
pub async fn facetas(db: &Database, incluir_inativos: bool) -> AppResult<Facetas> {
    let mut c = Conditions::default();
    if !incluir_inativos {
        c.push("ativo = ?", [true.into()]);
    }

    let mut facetas = Facetas::default();
    for (coluna, destino) in [
        ("categoria", &mut facetas.categorias),
        ("tipo", &mut facetas.tipos),
        ("enderecoCidade", &mut facetas.cidades),
        ("enderecoBairro", &mut facetas.bairros),
    ] {
        let mut cond = Conditions::default();
        cond.push(
            format!("{coluna} IS NOT NULL AND {coluna} <> ''"),
            Vec::<SqlValue>::new(),
        );
        if !incluir_inativos {
            cond.push("ativo = ?", [true.into()]);
        }
        let sql = format!(
            "SELECT {coluna} AS valor, COUNT(*) AS total FROM imoveis{} \
             GROUP BY {coluna} ORDER BY total DESC, valor ASC",
            cond.sql()
        );
        *destino = db
            .prepare(&sql)
            .all(cond.params())
            .await?
            .iter()
            .filter_map(contagem)
            .collect();
    }

    let sql = format!(
        "SELECT COUNT(*) AS total, MIN(preco) AS minimo, MAX(preco) AS maximo FROM imoveis{}",
        c.sql()
    );
    if let Some(row) = db.prepare(&sql).get(c.params()).await? {
        facetas.total = row.integer("total").unwrap_or(0);
        facetas.preco_min = row.number("minimo");
        facetas.preco_max = row.number("maximo");
    }
    Ok(facetas)
}
