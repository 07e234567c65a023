//! PostgreSQL record controller: one `(seq, id, doc JSONB)` table per collection plus a
//! shared `_counters` table for sequential ids.

use super::{sanitize_patch, stamp_new, Document, ReadOutcome, RecordController, WriteAck};
use crate::error::ControllerError;
use crate::query::{Projection, RecordFilter, SortCondition};
use crate::sql::{self, bind_all, qualified_table, QueryBuf};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{ConnectOptions, PgPool, Row};
use std::str::FromStr;

const COUNTERS_TABLE: &str = "_counters";

pub struct PgRecordController {
    pool: PgPool,
    collection: String,
    table: String,
    counters: String,
}

impl PgRecordController {
    pub fn new(pool: PgPool, schema: &str, collection: &str) -> Self {
        PgRecordController {
            pool,
            collection: collection.to_string(),
            table: qualified_table(schema, collection),
            counters: qualified_table(schema, COUNTERS_TABLE),
        }
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<PgRow>, ControllerError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(sqlx::query(&q.sql), &q.params).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn fetch_one(&self, q: &QueryBuf) -> Result<PgRow, ControllerError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(sqlx::query(&q.sql), &q.params).fetch_one(&self.pool).await?;
        Ok(row)
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, ControllerError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let done = bind_all(sqlx::query(&q.sql), &q.params).execute(&self.pool).await?;
        Ok(done.rows_affected())
    }
}

fn row_to_document(row: &PgRow) -> Result<Document, ControllerError> {
    match row.try_get::<Value, _>("doc")? {
        Value::Object(map) => Ok(map),
        other => Err(ControllerError::Failed(format!("stored document is not an object: {}", other))),
    }
}

#[async_trait]
impl RecordController for PgRecordController {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn create_record(&self, doc: Document) -> Result<Document, ControllerError> {
        let seq_row = self.fetch_one(&sql::next_sequence(&self.counters, &self.collection)).await?;
        let id: i64 = seq_row.try_get("sequence")?;
        let doc = stamp_new(doc, id as u64, Utc::now());
        let id = id.to_string();
        let row = self.fetch_one(&sql::insert_record(&self.table, &id, &doc)).await?;
        row_to_document(&row)
    }

    async fn read_records(
        &self,
        filter: &RecordFilter,
        projection: &Projection,
        sort: Option<&SortCondition>,
        is_count: bool,
        skip: u64,
        limit: u64,
    ) -> Result<ReadOutcome, ControllerError> {
        if is_count {
            let row = self.fetch_one(&sql::count_records(&self.table, filter)).await?;
            let count: i64 = row.try_get("count")?;
            return Ok(ReadOutcome::Count(count.max(0) as u64));
        }
        let q = sql::select_records(&self.table, filter, projection, sort, skip, limit);
        let rows = self.fetch_all(&q).await?;
        let docs = rows.iter().map(row_to_document).collect::<Result<Vec<_>, _>>()?;
        Ok(ReadOutcome::Documents(docs))
    }

    async fn update_records(&self, filter: &RecordFilter, patch: Document) -> Result<WriteAck, ControllerError> {
        let patch = sanitize_patch(patch);
        if patch.is_empty() {
            return Ok(WriteAck::modified(0));
        }
        let now = Utc::now().to_rfc3339();
        let n = self.execute(&sql::update_records(&self.table, filter, &patch, &now)).await?;
        Ok(WriteAck::modified(n))
    }

    async fn delete_records(&self, filter: &RecordFilter) -> Result<WriteAck, ControllerError> {
        let now = Utc::now().to_rfc3339();
        let n = self.execute(&sql::soft_delete_records(&self.table, filter, &now)).await?;
        Ok(WriteAck::modified(n))
    }

    async fn ping(&self) -> Result<(), ControllerError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

/// Connect a pool with at most `max_connections` connections.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, ControllerError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Create the schema, the `_counters` table and one document table per collection, if missing.
pub async fn ensure_collection_tables(
    pool: &PgPool,
    schema: &str,
    collections: &[&str],
) -> Result<(), ControllerError> {
    let schema_ident = format!("\"{}\"", schema.replace('"', "\"\""));
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema_ident))
        .execute(pool)
        .await?;

    let counters_ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            name TEXT PRIMARY KEY,
            sequence BIGINT NOT NULL
        )
        "#,
        qualified_table(schema, COUNTERS_TABLE)
    );
    sqlx::query(&counters_ddl).execute(pool).await?;

    for collection in collections {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                seq BIGSERIAL NOT NULL,
                id TEXT PRIMARY KEY,
                doc JSONB NOT NULL
            )
            "#,
            qualified_table(schema, collection)
        );
        sqlx::query(&ddl).execute(pool).await?;
        tracing::info!(schema = %schema, collection = %collection, "collection table ready");
    }
    Ok(())
}

/// Create the database named in `database_url` if it does not exist (connects to `postgres` to do so).
pub async fn ensure_database_exists(database_url: &str) -> Result<(), ControllerError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = PgConnectOptions::from_str(&admin_url)
        .map_err(|e| ControllerError::Failed(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        let quoted = format!("\"{}\"", db_name.replace('"', "\"\""));
        sqlx::query(&format!("CREATE DATABASE {}", quoted))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "database created");
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), ControllerError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| ControllerError::Failed("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}
