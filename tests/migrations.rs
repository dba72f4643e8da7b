use anyhow::Result;
use imobiliaria_lib::migrate;
#[path = "util.rs"]
mod util;

#[tokio::test]
async fn migrations_apply_once() -> Result<()> {
    let db = util::memory_db().await;

    let again = migrate::apply_migrations(&db).await?;
    assert!(again.applied.is_empty());
    assert!(!again.skipped.is_empty());

    let rows = db
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .all(&[])
        .await?;
    let tables: Vec<String> = rows.iter().filter_map(|r| r.text("name")).collect();
    for table in ["contatos_cliente", "imoveis", "leads", "schema_migrations"] {
        assert!(tables.iter().any(|t| t == table), "missing {table}");
    }
    Ok(())
}

#[tokio::test]
async fn leads_reference_existing_listings() -> Result<()> {
    let db = util::memory_db().await;
    let err = db
        .prepare(
            "INSERT INTO leads (imovelId, clienteNome, clienteTelefone, visualizado, createdAt) \
             VALUES ('XX001', 'Ana', '11987654321', 0, '2024-01-01T00:00:00.000Z')",
        )
        .run(&[])
        .await
        .expect_err("foreign key");
    assert!(err.code().starts_with("DB/"), "{}", err.code());
    assert!(err.message().contains("FOREIGN KEY"), "{}", err.message());
    Ok(())
}
