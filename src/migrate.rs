use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tracing::{error, info};

use crate::db::{preview, Database, Engine};
use crate::time::now_iso;
use crate::{AppError, AppResult};

type Migration = (&'static str, &'static str);

static SQLITE_MIGRATIONS: &[Migration] = &[
    (
        "0001_imoveis.sql",
        include_str!("../migrations/sqlite/0001_imoveis.sql"),
    ),
    (
        "0002_leads.sql",
        include_str!("../migrations/sqlite/0002_leads.sql"),
    ),
    (
        "0003_contatos_cliente.sql",
        include_str!("../migrations/sqlite/0003_contatos_cliente.sql"),
    ),
    (
        "0004_imoveis_chaves.sql",
        include_str!("../migrations/sqlite/0004_imoveis_chaves.sql"),
    ),
];

static POSTGRES_MIGRATIONS: &[Migration] = &[
    (
        "0001_imoveis.sql",
        include_str!("../migrations/postgres/0001_imoveis.sql"),
    ),
    (
        "0002_leads.sql",
        include_str!("../migrations/postgres/0002_leads.sql"),
    ),
    (
        "0003_contatos_cliente.sql",
        include_str!("../migrations/postgres/0003_contatos_cliente.sql"),
    ),
    (
        "0004_imoveis_chaves.sql",
        include_str!("../migrations/postgres/0004_imoveis_chaves.sql"),
    ),
];

fn migrations_for(engine: Engine) -> &'static [Migration] {
    match engine {
        Engine::Sqlite => SQLITE_MIGRATIONS,
        Engine::Postgres => POSTGRES_MIGRATIONS,
    }
}

fn strip_comments(raw_sql: &str) -> String {
    raw_sql
        .lines()
        .filter(|line| {
            let t = line.trim_start();
            !(t.is_empty() || t.starts_with("--"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn checksum(raw_sql: &str) -> String {
    format!("{:x}", Sha256::digest(strip_comments(raw_sql).as_bytes()))
}

/// Outcome of one `apply_migrations` call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

/// Apply the embedded schema for the connected engine.
///
/// DDL is idempotent (`IF NOT EXISTS`), so a run interrupted between statements
/// can simply be repeated.
pub async fn apply_migrations(db: &Database) -> AppResult<MigrationReport> {
    db.execute_script(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
           version   TEXT PRIMARY KEY,\
           applied_at TEXT NOT NULL,\
           checksum TEXT NOT NULL\
         )",
    )
    .await?;

    let rows = db
        .prepare("SELECT version, checksum FROM schema_migrations")
        .all(&[])
        .await?;
    let applied: HashMap<String, String> = rows
        .iter()
        .filter_map(|r| Some((r.text("version")?, r.text("checksum")?)))
        .collect();

    let mut report = MigrationReport::default();
    for (filename, raw_sql) in migrations_for(db.engine()) {
        let checksum = checksum(raw_sql);

        if let Some(stored) = applied.get(*filename) {
            if stored != &checksum {
                return Err(AppError::new(
                    "MIGRATION/CHECKSUM_MISMATCH",
                    format!("migration {filename} edited after application"),
                ));
            }
            info!(target: "imobiliaria", event = "migration_skip_file", file = %filename);
            report.skipped.push((*filename).to_string());
            continue;
        }

        for stmt in strip_comments(raw_sql).split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            info!(target: "imobiliaria", event = "migration_stmt", file = %filename, sql = %preview(s));
            if let Err(e) = db.prepare(s).run(&[]).await {
                error!(target: "imobiliaria", event = "migration_stmt_error", file = %filename, sql = %preview(s), error = %e);
                return Err(e.with_context("migration", *filename));
            }
        }

        db.prepare(
            "INSERT INTO schema_migrations (version, applied_at, checksum) VALUES (?, ?, ?)",
        )
        .run(&[(*filename).into(), now_iso().into(), checksum.into()])
        .await?;
        info!(target: "imobiliaria", event = "migration_file_applied", file = %filename, engine = %db.engine());
        report.applied.push((*filename).to_string());
    }

    Ok(report)
}
