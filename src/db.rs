use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, SqlitePool};

use crate::{AppError, AppResult};

pub mod placeholders;
pub mod postgres;
pub mod sqlite;
mod value;

pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;
pub use value::{DbRow, SqlKind, SqlValue};

pub const CONNECT_ATTEMPTS: u32 = 10;
const BACKOFF_STEP: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Sqlite,
    Postgres,
}

impl Engine {
    pub fn as_str(self) -> &'static str {
        match self {
            Engine::Sqlite => "sqlite",
            Engine::Postgres => "postgres",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the relational store lives, resolved once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Sqlite(PathBuf),
    Postgres(String),
}

impl DatabaseTarget {
    /// `postgres://` / `postgresql://` URLs select PostgreSQL, anything else is a SQLite path
    /// (an optional `sqlite:` / `sqlite://` scheme is stripped).
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("postgres://") || trimmed.starts_with("postgresql://") {
            return DatabaseTarget::Postgres(trimmed.to_string());
        }
        let path = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
            .unwrap_or(trimmed);
        DatabaseTarget::Sqlite(PathBuf::from(path))
    }

    pub fn engine(&self) -> Engine {
        match self {
            DatabaseTarget::Sqlite(_) => Engine::Sqlite,
            DatabaseTarget::Postgres(_) => Engine::Postgres,
        }
    }

    /// Description safe to log: PostgreSQL credentials are dropped.
    pub fn redacted(&self) -> String {
        match self {
            DatabaseTarget::Sqlite(path) => path.display().to_string(),
            DatabaseTarget::Postgres(url) => match url.rsplit_once('@') {
                Some((_, host)) => format!("postgres://***@{host}"),
                None => url.clone(),
            },
        }
    }
}

/// Metadata returned by `Statement::run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunResult {
    pub rows_affected: u64,
    /// SQLite rowid of the last insert; PostgreSQL callers use `RETURNING` instead.
    pub last_insert_id: Option<i64>,
}

/// One statement of a `Database::transaction` batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl BatchStatement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// One relational engine. Statements use `?` placeholders; each backend adapts them.
#[async_trait]
pub trait Backend: Send + Sync {
    fn engine(&self) -> Engine;
    async fn fetch_optional(&self, sql: &str, params: &[SqlValue]) -> AppResult<Option<DbRow>>;
    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> AppResult<Vec<DbRow>>;
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> AppResult<RunResult>;
    /// Run every statement in one transaction; nothing is kept if any fails.
    async fn execute_batch(&self, statements: &[BatchStatement]) -> AppResult<Vec<RunResult>>;
    /// Run a multi-statement script (migrations).
    async fn execute_script(&self, sql: &str) -> AppResult<()>;
    async fn ping(&self) -> AppResult<()>;
    async fn close(&self);
}

/// Uniform `prepare(sql).get / all / run` handle over the injected backend.
#[derive(Clone)]
pub struct Database {
    backend: Arc<dyn Backend>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("engine", &self.engine())
            .finish()
    }
}

impl Database {
    pub fn from_backend(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn sqlite(pool: SqlitePool) -> Self {
        Self::from_backend(Arc::new(SqliteBackend::new(pool)))
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self::from_backend(Arc::new(PostgresBackend::new(pool)))
    }

    pub fn engine(&self) -> Engine {
        self.backend.engine()
    }

    pub fn prepare<'a>(&'a self, sql: &'a str) -> Statement<'a> {
        Statement { db: self, sql }
    }

    pub async fn transaction(&self, statements: &[BatchStatement]) -> AppResult<Vec<RunResult>> {
        self.backend.execute_batch(statements).await.map_err(|err| {
            let sql = statements
                .iter()
                .map(|s| s.sql.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            log_failure(err, "transaction", &sql)
        })
    }

    pub async fn execute_script(&self, sql: &str) -> AppResult<()> {
        self.backend
            .execute_script(sql)
            .await
            .map_err(|err| log_failure(err, "script", sql))
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.backend.ping().await
    }

    pub async fn close(&self) {
        self.backend.close().await;
    }
}

pub struct Statement<'a> {
    db: &'a Database,
    sql: &'a str,
}

impl Statement<'_> {
    /// First row, or `None`.
    pub async fn get(&self, params: &[SqlValue]) -> AppResult<Option<DbRow>> {
        self.db
            .backend
            .fetch_optional(self.sql, params)
            .await
            .map_err(|err| log_failure(err, "get", self.sql))
    }

    pub async fn all(&self, params: &[SqlValue]) -> AppResult<Vec<DbRow>> {
        self.db
            .backend
            .fetch_all(self.sql, params)
            .await
            .map_err(|err| log_failure(err, "all", self.sql))
    }

    pub async fn run(&self, params: &[SqlValue]) -> AppResult<RunResult> {
        self.db
            .backend
            .execute(self.sql, params)
            .await
            .map_err(|err| log_failure(err, "run", self.sql))
    }
}

pub(crate) fn preview(sql: &str) -> String {
    let one_line = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if one_line.chars().count() > 160 {
        let cut: String = one_line.chars().take(160).collect();
        format!("{cut}…")
    } else {
        one_line
    }
}

fn log_failure(err: AppError, op: &'static str, sql: &str) -> AppError {
    tracing::error!(
        target: "imobiliaria",
        event = "db_query_failed",
        op = op,
        code = %err.code,
        error = %err.message,
        sql = %preview(sql),
    );
    err.with_context("op", op)
}

/// Delay before retry `attempt` (1-based): grows by 500 ms per attempt, capped at 5 s.
pub fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_STEP.saturating_mul(attempt).min(BACKOFF_CAP)
}

pub async fn connect(target: &DatabaseTarget) -> AppResult<Database> {
    match target {
        DatabaseTarget::Sqlite(path) => Ok(Database::sqlite(sqlite::open_sqlite_pool(path).await?)),
        DatabaseTarget::Postgres(url) => Ok(Database::postgres(postgres::open_pg_pool(url).await?)),
    }
}

/// Startup connection loop. This is the only place database work is retried.
pub async fn connect_with_retry(target: &DatabaseTarget, attempts: u32) -> AppResult<Database> {
    let mut attempt = 1;
    loop {
        match connect(target).await {
            Ok(db) => {
                tracing::info!(
                    target: "imobiliaria",
                    event = "db_connected",
                    engine = %target.engine(),
                    target_db = %target.redacted(),
                    attempt = attempt,
                );
                return Ok(db);
            }
            Err(err) if attempt < attempts => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    target: "imobiliaria",
                    event = "db_connect_retry",
                    engine = %target.engine(),
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::error!(
                    target: "imobiliaria",
                    event = "db_connect_failed",
                    engine = %target.engine(),
                    attempts = attempt,
                    error = %err,
                );
                return Err(err.with_context("attempts", attempt.to_string()));
            }
        }
    }
}
