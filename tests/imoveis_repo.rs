use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use imobiliaria_lib::db::{
    Backend, BatchStatement, Database, DbRow, Engine, RunResult, SqliteBackend, SqlValue,
};
use imobiliaria_lib::AppResult;
use sqlx::SqlitePool;
use imobiliaria_lib::id::gerar_proximo_id;
use imobiliaria_lib::model::Foto;
use imobiliaria_lib::pagination::PageRequest;
use imobiliaria_lib::repo::imoveis::{self, ImovelFiltro, Ordenacao};
use imobiliaria_lib::repo::leads;
#[path = "util.rs"]
mod util;

async fn insert_raw(db: &Database, id: &str, tipo: &str) -> Result<()> {
    db.prepare(
        "INSERT INTO imoveis (id, categoria, tipo, titulo, createdAt, updatedAt) \
         VALUES (?, 'venda', ?, 'legado', '2023-01-01T00:00:00.000Z', '2023-01-01T00:00:00.000Z')",
    )
    .run(&[SqlValue::from(id), SqlValue::from(tipo)])
    .await?;
    Ok(())
}

#[tokio::test]
async fn next_id_starts_at_one_and_follows_the_largest() -> Result<()> {
    let db = util::memory_db().await;
    assert_eq!(gerar_proximo_id(&db, "Casa").await?, "CA001");

    insert_raw(&db, "CA007", "casa").await?;
    insert_raw(&db, "CA002", "casa").await?;
    insert_raw(&db, "AP010", "apartamento").await?;
    assert_eq!(gerar_proximo_id(&db, "Casa").await?, "CA008");
    assert_eq!(gerar_proximo_id(&db, "Apartamento").await?, "AP011");
    assert_eq!(gerar_proximo_id(&db, "Chácara").await?, "CH001");
    assert_eq!(gerar_proximo_id(&db, "castelo").await?, "IM001");
    Ok(())
}

#[tokio::test]
async fn next_id_is_numeric_past_three_digits() -> Result<()> {
    let db = util::memory_db().await;
    insert_raw(&db, "CA999", "casa").await?;
    assert_eq!(gerar_proximo_id(&db, "casa").await?, "CA1000");
    insert_raw(&db, "CA1000", "casa").await?;
    assert_eq!(gerar_proximo_id(&db, "casa").await?, "CA1001");
    Ok(())
}

#[tokio::test]
async fn create_assigns_sequential_ids_and_round_trips() -> Result<()> {
    let db = util::memory_db().await;
    let mut entrada = util::imovel("Casa", "Casa com piscina", 450_000.0);
    entrada.fotos = vec![
        Foto::new("https://exemplo.com/1.jpg"),
        Foto {
            destaque: true,
            ..Foto::new("https://exemplo.com/2.jpg")
        },
        Foto {
            destaque: true,
            ..Foto::new("https://exemplo.com/3.jpg")
        },
    ];
    let primeiro = imoveis::criar(&db, entrada.clone()).await?;
    let segundo = imoveis::criar(&db, entrada).await?;
    assert_eq!(primeiro.id, "CA001");
    assert_eq!(segundo.id, "CA002");
    assert!(primeiro.ativo);
    assert!(!primeiro.created_at.is_empty());

    let lido = imoveis::obter(&db, "CA001").await?;
    assert_eq!(lido, primeiro);
    let urls: Vec<&str> = lido.fotos.iter().map(|f| f.url.as_str()).collect();
    assert_eq!(
        urls,
        ["https://exemplo.com/1.jpg", "https://exemplo.com/2.jpg", "https://exemplo.com/3.jpg"]
    );
    assert_eq!(lido.fotos.iter().filter(|f| f.destaque).count(), 1);
    assert_eq!(lido.foto_capa().map(|f| f.url.as_str()), Some("https://exemplo.com/2.jpg"));
    Ok(())
}

#[tokio::test]
async fn create_rejects_invalid_listing() -> Result<()> {
    let db = util::memory_db().await;
    let mut invalido = util::imovel("Casa", "", -1.0);
    invalido.categoria.clear();
    let err = imoveis::criar(&db, invalido).await.expect_err("invalid");
    assert_eq!(err.code(), "VALIDATION/INVALID");
    assert!(err.details().len() >= 3);
    Ok(())
}

#[tokio::test]
async fn update_replaces_everything_but_identity() -> Result<()> {
    let db = util::memory_db().await;
    let criado = imoveis::criar(&db, util::imovel("Apartamento", "Apto centro", 300_000.0)).await?;

    let mut novo = util::imovel("Apartamento", "Apto reformado", 320_000.0);
    novo.id = "XX999".into();
    novo.quartos = None;
    novo.ativo = false;
    let atualizado = imoveis::atualizar(&db, &criado.id, novo).await?;
    assert_eq!(atualizado.id, criado.id);
    assert_eq!(atualizado.created_at, criado.created_at);
    assert_eq!(atualizado.titulo, "Apto reformado");
    assert_eq!(atualizado.quartos, None);
    assert!(!atualizado.ativo);

    let err = imoveis::atualizar(&db, "AP404", util::imovel("Apartamento", "x", 1.0))
        .await
        .expect_err("missing");
    assert_eq!(err.code(), "IMOVEL/NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn public_listing_filters_sorts_and_paginates() -> Result<()> {
    let db = util::memory_db().await;
    for (tipo, titulo, preco) in [
        ("Casa", "Casa A", 500_000.0),
        ("Casa", "Casa B", 200_000.0),
        ("Apartamento", "Apto C", 350_000.0),
        ("Terreno", "Terreno com piscina natural", 90_000.0),
    ] {
        imoveis::criar(&db, util::imovel(tipo, titulo, preco)).await?;
    }
    let mut inativo = util::imovel("Casa", "Casa oculta", 1.0);
    inativo.ativo = false;
    imoveis::criar(&db, inativo).await?;

    let todos = imoveis::listar(&db, &ImovelFiltro::default(), None).await?;
    assert_eq!(todos.data.len(), 4);
    assert!(todos.pagination.is_none());

    let casas = ImovelFiltro {
        tipo: Some("CASA".into()),
        ordenacao: Ordenacao::PrecoAsc,
        ..ImovelFiltro::default()
    };
    let casas = imoveis::listar(&db, &casas, None).await?;
    let precos: Vec<f64> = casas.data.iter().map(|i| i.preco).collect();
    assert_eq!(precos, [200_000.0, 500_000.0]);

    let busca = ImovelFiltro {
        busca: Some("PISCINA".into()),
        ..ImovelFiltro::default()
    };
    assert_eq!(imoveis::listar(&db, &busca, None).await?.data.len(), 1);

    let faixa = ImovelFiltro {
        preco_min: Some(100_000.0),
        preco_max: Some(400_000.0),
        ..ImovelFiltro::default()
    };
    assert_eq!(imoveis::listar(&db, &faixa, None).await?.data.len(), 2);

    let page = PageRequest::from_query(Some(2), Some(3));
    let pagina = imoveis::listar(&db, &ImovelFiltro::default(), page).await?;
    let p = pagina.pagination.expect("pagination");
    assert_eq!(pagina.data.len(), 1);
    assert_eq!((p.total, p.total_pages), (4, 2));
    assert!(!p.has_next_page);
    assert!(p.has_prev_page);

    let admin = ImovelFiltro {
        incluir_inativos: true,
        ..ImovelFiltro::default()
    };
    assert_eq!(imoveis::listar(&db, &admin, None).await?.data.len(), 5);
    assert!(imoveis::buscar(&db, "CA003", false).await?.is_none());
    assert!(imoveis::buscar(&db, "CA003", true).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn facets_count_active_listings() -> Result<()> {
    let db = util::memory_db().await;
    imoveis::criar(&db, util::imovel("Casa", "Casa A", 500_000.0)).await?;
    imoveis::criar(&db, util::imovel("Casa", "Casa B", 200_000.0)).await?;
    imoveis::criar(&db, util::imovel("Apartamento", "Apto", 350_000.0)).await?;

    let facetas = imoveis::facetas(&db, false).await?;
    assert_eq!(facetas.total, 3);
    assert_eq!(facetas.preco_min, Some(200_000.0));
    assert_eq!(facetas.preco_max, Some(500_000.0));
    let casa = facetas
        .tipos
        .iter()
        .find(|c| c.valor == "Casa")
        .expect("casa facet");
    assert_eq!(casa.total, 2);
    Ok(())
}

#[tokio::test]
async fn delete_removes_listing_and_its_leads() -> Result<()> {
    let db = util::memory_db().await;
    let criado = imoveis::criar(&db, util::imovel("Casa", "Casa A", 500_000.0)).await?;
    leads::criar(&db, util::lead(&criado.id)).await?;
    leads::criar(&db, util::lead(&criado.id)).await?;

    let removido = imoveis::excluir(&db, &criado.id).await?;
    assert_eq!(removido.id, criado.id);
    assert!(imoveis::buscar(&db, &criado.id, true).await?.is_none());
    let restantes = leads::listar(&db, &Default::default(), None).await?;
    assert!(restantes.data.is_empty());

    let err = imoveis::excluir(&db, &criado.id).await.expect_err("gone");
    assert_eq!(err.code(), "IMOVEL/NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn search_ignores_accents_and_case() -> Result<()> {
    let db = util::memory_db().await;
    let mut gourmet = util::imovel("Casa", "Área gourmet ampla", 600_000.0);
    gourmet.descricao = "Churrasqueira e forno".into();
    let gourmet = imoveis::criar(&db, gourmet).await?;
    imoveis::criar(&db, util::imovel("Casa", "Casa simples", 300_000.0)).await?;

    for termo in ["área", "AREA", "Área Gourmet"] {
        let filtro = ImovelFiltro {
            busca: Some(termo.into()),
            ..ImovelFiltro::default()
        };
        let achados = imoveis::listar(&db, &filtro, None).await?.data;
        assert_eq!(achados.len(), 1, "busca {termo:?}");
        assert_eq!(achados[0].id, gourmet.id);
    }
    Ok(())
}

#[tokio::test]
async fn facet_values_filter_back_to_their_listings() -> Result<()> {
    let db = util::memory_db().await;
    let mut sp = util::imovel("Apartamento", "Apto Paulista", 900_000.0);
    sp.endereco.cidade = "SÃO PAULO".into();
    sp.endereco.bairro = "Jardim Paulistano".into();
    imoveis::criar(&db, sp).await?;
    imoveis::criar(&db, util::imovel("Casa", "Casa A", 300_000.0)).await?;

    let facetas = imoveis::facetas(&db, false).await?;
    let cidade = facetas
        .cidades
        .iter()
        .find(|c| c.valor == "SÃO PAULO")
        .expect("city facet");
    assert_eq!(cidade.total, 1);

    for valor in [cidade.valor.as_str(), "são paulo", "Sao Paulo"] {
        let filtro = ImovelFiltro {
            cidade: Some(valor.into()),
            ..ImovelFiltro::default()
        };
        assert_eq!(imoveis::listar(&db, &filtro, None).await?.data.len(), 1, "cidade {valor:?}");
    }
    let filtro = ImovelFiltro {
        tipo: Some("APARTAMENTO".into()),
        bairro: Some("jardim paulistano".into()),
        ..ImovelFiltro::default()
    };
    assert_eq!(imoveis::listar(&db, &filtro, None).await?.data.len(), 1);
    Ok(())
}

#[tokio::test]
async fn keys_are_backfilled_for_older_rows() -> Result<()> {
    let db = util::memory_db().await;
    insert_raw(&db, "CH001", "Chácara").await?;
    let filtro = ImovelFiltro {
        tipo: Some("chacara".into()),
        ..ImovelFiltro::default()
    };
    assert!(imoveis::listar(&db, &filtro, None).await?.data.is_empty());

    assert_eq!(imoveis::reindexar_chaves(&db).await?, 1);
    assert_eq!(imoveis::reindexar_chaves(&db).await?, 0);
    let achados = imoveis::listar(&db, &filtro, None).await?.data;
    assert_eq!(achados.len(), 1);
    assert_eq!(achados[0].id, "CH001");
    Ok(())
}

/// Inserts a competing row with the allocated ID right before the next
/// `collisions` listing inserts, as a concurrent create would.
struct RivalInsert {
    inner: SqliteBackend,
    collisions: AtomicU32,
    inserts: AtomicU32,
}

impl RivalInsert {
    fn database(pool: SqlitePool, collisions: u32) -> (Database, Arc<Self>) {
        let backend = Arc::new(Self {
            inner: SqliteBackend::new(pool),
            collisions: AtomicU32::new(collisions),
            inserts: AtomicU32::new(0),
        });
        (Database::from_backend(backend.clone()), backend)
    }
}

#[async_trait]
impl Backend for RivalInsert {
    fn engine(&self) -> Engine {
        self.inner.engine()
    }

    async fn fetch_optional(&self, sql: &str, params: &[SqlValue]) -> AppResult<Option<DbRow>> {
        self.inner.fetch_optional(sql, params).await
    }

    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> AppResult<Vec<DbRow>> {
        self.inner.fetch_all(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> AppResult<RunResult> {
        if sql.starts_with("INSERT INTO imoveis (") {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            let pending = self.collisions.load(Ordering::SeqCst);
            if pending > 0 {
                self.collisions.store(pending - 1, Ordering::SeqCst);
                self.inner
                    .execute(
                        "INSERT INTO imoveis (id, categoria, tipo, titulo, createdAt, updatedAt) \
                         VALUES (?, 'venda', 'Casa', 'concorrente', \
                         '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.000Z')",
                        &params[..1],
                    )
                    .await?;
            }
        }
        self.inner.execute(sql, params).await
    }

    async fn execute_batch(&self, statements: &[BatchStatement]) -> AppResult<Vec<RunResult>> {
        self.inner.execute_batch(statements).await
    }

    async fn execute_script(&self, sql: &str) -> AppResult<()> {
        self.inner.execute_script(sql).await
    }

    async fn ping(&self) -> AppResult<()> {
        self.inner.ping().await
    }

    async fn close(&self) {
        self.inner.close().await
    }
}

#[tokio::test]
async fn create_retries_with_the_next_id_after_a_conflict() -> Result<()> {
    let (db, rival) = RivalInsert::database(util::memory_pool().await, 1);

    let criado = imoveis::criar(&db, util::imovel("Casa", "Casa A", 500_000.0)).await?;
    assert_eq!(criado.id, "CA002");
    assert_eq!(criado.titulo, "Casa A");
    assert_eq!(rival.inserts.load(Ordering::SeqCst), 2);
    assert_eq!(imoveis::obter(&db, "CA001").await?.titulo, "concorrente");
    Ok(())
}

#[tokio::test]
async fn create_gives_up_after_repeated_conflicts() -> Result<()> {
    let (db, rival) = RivalInsert::database(util::memory_pool().await, u32::MAX);

    let err = imoveis::criar(&db, util::imovel("Casa", "Casa A", 500_000.0))
        .await
        .expect_err("every insert collides");
    assert_eq!(err.code(), "DB/CONFLICT");
    assert_eq!(rival.inserts.load(Ordering::SeqCst), imoveis::ID_ATTEMPTS);
    let todos = imoveis::listar(
        &db,
        &ImovelFiltro {
            incluir_inativos: true,
            ..ImovelFiltro::default()
        },
        None,
    )
    .await?;
    assert!(todos.data.iter().all(|i| i.titulo == "concorrente"));
    Ok(())
}

#[tokio::test]
async fn failed_transaction_keeps_earlier_statements_out() -> Result<()> {
    let db = util::memory_db().await;
    let criado = imoveis::criar(&db, util::imovel("Casa", "Casa A", 500_000.0)).await?;
    leads::criar(&db, util::lead(&criado.id)).await?;

    let err = db
        .transaction(&[
            BatchStatement::new("DELETE FROM leads WHERE imovelId = ?", vec![criado.id.as_str().into()]),
            BatchStatement::new("DELETE FROM tabela_inexistente WHERE id = ?", vec![criado.id.as_str().into()]),
        ])
        .await
        .expect_err("second statement fails");
    assert!(err.code().starts_with("DB/") || err.code().starts_with("SQLX/"), "{}", err.code());

    assert_eq!(leads::listar(&db, &Default::default(), None).await?.data.len(), 1);
    assert!(imoveis::buscar(&db, &criado.id, true).await?.is_some());
    Ok(())
}
