use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::{query::Query, Column, Postgres, Row, TypeInfo, ValueRef};

use super::{placeholders, Backend, BatchStatement, DbRow, Engine, RunResult, SqlKind, SqlValue};
use crate::AppResult;

const MAX_CONNECTIONS: u32 = 20;

pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub async fn open_pg_pool(url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(30))
        .connect(url)
        .await?;

    let version: (String,) = sqlx::query_as("SHOW server_version")
        .fetch_one(&pool)
        .await
        .unwrap_or((String::from("unknown"),));
    tracing::info!(
        target: "imobiliaria",
        event = "db_open",
        engine = "postgres",
        server_version = %version.0,
        max_connections = MAX_CONNECTIONS,
    );
    Ok(pool)
}

fn row_to_db_row(row: &PgRow) -> DbRow {
    let mut out = DbRow::new();
    for col in row.columns() {
        let idx = col.ordinal();
        let val = match row.try_get_raw(idx) {
            Ok(raw) if !raw.is_null() => {
                let type_name = raw.type_info().name().to_string();
                decode(row, idx, &type_name)
            }
            _ => SqlValue::Null(SqlKind::Text),
        };
        out.insert(col.name(), val);
    }
    out
}

fn decode(row: &PgRow, idx: usize, type_name: &str) -> SqlValue {
    let decoded = match type_name {
        "INT8" => row.try_get::<i64, _>(idx).map(SqlValue::Integer),
        "INT4" => row
            .try_get::<i32, _>(idx)
            .map(|v| SqlValue::Integer(i64::from(v))),
        "INT2" => row
            .try_get::<i16, _>(idx)
            .map(|v| SqlValue::Integer(i64::from(v))),
        "FLOAT8" => row.try_get::<f64, _>(idx).map(SqlValue::Real),
        "FLOAT4" => row
            .try_get::<f32, _>(idx)
            .map(|v| SqlValue::Real(f64::from(v))),
        "BOOL" => row.try_get::<bool, _>(idx).map(SqlValue::Bool),
        _ => row.try_get::<String, _>(idx).map(SqlValue::Text),
    };
    decoded.unwrap_or_else(|err| {
        tracing::warn!(
            target: "imobiliaria",
            event = "db_decode_skipped",
            column_index = idx,
            pg_type = type_name,
            error = %err,
        );
        SqlValue::Null(SqlKind::Text)
    })
}

fn bind_value<'q>(
    q: Query<'q, Postgres, PgArguments>,
    v: &'q SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match v {
        SqlValue::Null(SqlKind::Integer) => q.bind(Option::<i64>::None),
        SqlValue::Null(SqlKind::Real) => q.bind(Option::<f64>::None),
        SqlValue::Null(SqlKind::Bool) => q.bind(Option::<bool>::None),
        SqlValue::Null(SqlKind::Text) => q.bind(Option::<String>::None),
        SqlValue::Integer(i) => q.bind(*i),
        SqlValue::Real(f) => q.bind(*f),
        SqlValue::Text(s) => q.bind(s.as_str()),
        SqlValue::Bool(b) => q.bind(*b),
    }
}

fn build<'q>(sql: &'q str, params: &'q [SqlValue]) -> Query<'q, Postgres, PgArguments> {
    params
        .iter()
        .fold(sqlx::query(sql), |q, value| bind_value(q, value))
}

#[async_trait]
impl Backend for PostgresBackend {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    async fn fetch_optional(&self, sql: &str, params: &[SqlValue]) -> AppResult<Option<DbRow>> {
        let sql = placeholders::to_numbered(sql);
        let row = build(&sql, params).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_db_row))
    }

    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> AppResult<Vec<DbRow>> {
        let sql = placeholders::to_numbered(sql);
        let rows = build(&sql, params).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_db_row).collect())
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> AppResult<RunResult> {
        let sql = placeholders::to_numbered(sql);
        let res = build(&sql, params).execute(&self.pool).await?;
        Ok(RunResult {
            rows_affected: res.rows_affected(),
            last_insert_id: None,
        })
    }

    async fn execute_batch(&self, statements: &[BatchStatement]) -> AppResult<Vec<RunResult>> {
        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(statements.len());
        for stmt in statements {
            let sql = placeholders::to_numbered(&stmt.sql);
            let res = build(&sql, &stmt.params).execute(&mut *tx).await?;
            results.push(RunResult {
                rows_affected: res.rows_affected(),
                last_insert_id: None,
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
