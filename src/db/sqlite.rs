use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{query::Query, Column, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};

use super::{Backend, BatchStatement, DbRow, Engine, RunResult, SqlValue};
use crate::AppResult;

pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub async fn open_sqlite_pool(db_path: &Path) -> AppResult<SqlitePool> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            tracing::error!(
                target: "imobiliaria",
                error = %e,
                event = "db_dir_create_failed",
                path = %parent.display()
            );
            e
        })?;
    }
    tracing::info!(target: "imobiliaria", event = "db_path", path = %db_path.display());

    let opts = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .after_connect(|conn, _| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys=ON;")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("PRAGMA wal_autocheckpoint = 1000;")
                    .execute(&mut *conn)
                    .await?;
                Ok::<_, sqlx::Error>(())
            })
        })
        .connect_with(opts)
        .await?;

    log_effective_pragmas(&pool).await;

    Ok(pool)
}

async fn log_effective_pragmas(pool: &SqlitePool) {
    use tracing::{info, warn};

    let (sqlite_ver,): (String,) = sqlx::query_as("select sqlite_version()")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let jm: (String,) = sqlx::query_as("PRAGMA journal_mode;")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let fks: (i64,) = sqlx::query_as("PRAGMA foreign_keys;")
        .fetch_one(pool)
        .await
        .unwrap_or((i64::MIN,));

    info!(
        target: "imobiliaria",
        event = "db_open",
        engine = "sqlite",
        sqlite_version = %sqlite_ver,
        journal_mode = %jm.0,
        foreign_keys = %fks.0,
    );

    if !jm.0.eq_ignore_ascii_case("wal") {
        warn!(
            target: "imobiliaria",
            event = "db_open_warning",
            msg = "journal_mode != WAL; running with reduced crash safety"
        );
    }
}

fn row_to_db_row(row: &SqliteRow) -> DbRow {
    let mut out = DbRow::new();
    for col in row.columns() {
        let idx = col.ordinal();
        let val = match row.try_get_raw(idx) {
            Ok(raw) if !raw.is_null() => match raw.type_info().name() {
                "INTEGER" | "INT8" | "BIGINT" | "BOOLEAN" => row
                    .try_get::<i64, _>(idx)
                    .map(SqlValue::Integer)
                    .unwrap_or(SqlValue::Null(super::SqlKind::Integer)),
                "REAL" | "NUMERIC" => row
                    .try_get::<f64, _>(idx)
                    .map(SqlValue::Real)
                    .unwrap_or(SqlValue::Null(super::SqlKind::Real)),
                _ => row
                    .try_get::<String, _>(idx)
                    .map(SqlValue::Text)
                    .unwrap_or(SqlValue::Null(super::SqlKind::Text)),
            },
            _ => SqlValue::Null(super::SqlKind::Text),
        };
        out.insert(col.name(), val);
    }
    out
}

fn bind_value<'q>(
    q: Query<'q, Sqlite, SqliteArguments<'q>>,
    v: &'q SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match v {
        SqlValue::Null(_) => q.bind(Option::<i64>::None),
        SqlValue::Integer(i) => q.bind(*i),
        SqlValue::Real(f) => q.bind(*f),
        SqlValue::Text(s) => q.bind(s.as_str()),
        SqlValue::Bool(b) => q.bind(i64::from(*b)),
    }
}

fn build<'q>(sql: &'q str, params: &'q [SqlValue]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    params
        .iter()
        .fold(sqlx::query(sql), |q, value| bind_value(q, value))
}

#[async_trait]
impl Backend for SqliteBackend {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    async fn fetch_optional(&self, sql: &str, params: &[SqlValue]) -> AppResult<Option<DbRow>> {
        let row = build(sql, params).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_db_row))
    }

    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> AppResult<Vec<DbRow>> {
        let rows = build(sql, params).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_db_row).collect())
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> AppResult<RunResult> {
        let res = build(sql, params).execute(&self.pool).await?;
        Ok(RunResult {
            rows_affected: res.rows_affected(),
            last_insert_id: Some(res.last_insert_rowid()),
        })
    }

    async fn execute_batch(&self, statements: &[BatchStatement]) -> AppResult<Vec<RunResult>> {
        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(statements.len());
        for stmt in statements {
            let res = build(&stmt.sql, &stmt.params).execute(&mut *tx).await?;
            results.push(RunResult {
                rows_affected: res.rows_affected(),
                last_insert_id: Some(res.last_insert_rowid()),
            });
        }
        tx.commit().await?;
        Ok(results)
    }

    async fn execute_script(&self, sql: &str) -> AppResult<()> {
        sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
