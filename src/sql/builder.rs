//! Builds parameterized SELECT, INSERT and UPDATE statements over a `(seq, id, doc JSONB)` table.

use crate::query::{Predicate, Projection, RecordFilter, SortCondition, SortDirection};
use crate::sql::params::PgBindValue;
use crate::store::Document;
use serde_json::Value;

/// Soft-deleted documents are invisible to every read and write.
const LIVE_CONDITION: &str = "(doc->>'isDeleted') IS DISTINCT FROM 'true'";

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a parameter and return its placeholder (`$n`).
    fn push_param(&mut self, v: PgBindValue) -> String {
        self.params.push(v);
        format!("${}", self.params.len())
    }

    fn push_text(&mut self, s: &str) -> String {
        self.push_param(PgBindValue::Text(s.to_string()))
    }
}

fn is_numeric(s: &str) -> bool {
    s.trim().parse::<f64>().map(|n| n.is_finite()).unwrap_or(false)
}

/// Numeric view of a field: NULL unless the stored JSON value is a number.
fn numeric_field(field_ph: &str) -> String {
    format!(
        "(CASE WHEN jsonb_typeof(doc->{f}) = 'number' THEN (doc->>{f})::numeric END)",
        f = field_ph
    )
}

/// Text view of a field under byte-order collation, so ranges agree with the in-memory store.
fn text_field(field_ph: &str) -> String {
    format!("(doc->>{}) COLLATE \"C\"", field_ph)
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn comparison(q: &mut QueryBuf, field_ph: &str, op: &str, operand: &str) -> String {
    if is_numeric(operand) {
        let v = q.push_text(operand.trim());
        format!("{} {} {}::numeric", numeric_field(field_ph), op, v)
    } else {
        let v = q.push_text(operand);
        format!("{} {} {}", text_field(field_ph), op, v)
    }
}

fn condition(q: &mut QueryBuf, field: &str, predicate: &Predicate) -> String {
    let f = q.push_text(field);
    match predicate {
        Predicate::Eq(v) => {
            let v = q.push_text(v);
            format!("doc->>{} = {}", f, v)
        }
        Predicate::Ne(v) => {
            let v = q.push_text(v);
            format!("doc->>{} IS DISTINCT FROM {}", f, v)
        }
        Predicate::Gt(v) => comparison(q, &f, ">", v),
        Predicate::Gte(v) => comparison(q, &f, ">=", v),
        Predicate::Lt(v) => comparison(q, &f, "<", v),
        Predicate::Lte(v) => comparison(q, &f, "<=", v),
        Predicate::Between(low, high) => {
            if is_numeric(low) && is_numeric(high) {
                let lo = q.push_text(low.trim());
                let hi = q.push_text(high.trim());
                format!("{} BETWEEN {}::numeric AND {}::numeric", numeric_field(&f), lo, hi)
            } else {
                let lo = q.push_text(low);
                let hi = q.push_text(high);
                format!("{} BETWEEN {} AND {}", text_field(&f), lo, hi)
            }
        }
        Predicate::Contains(keyword) => {
            let pattern = q.push_text(&format!("%{}%", escape_like(keyword)));
            format!("doc->>{} ILIKE {}", f, pattern)
        }
    }
}

fn where_clause(q: &mut QueryBuf, filter: &RecordFilter) -> String {
    let mut parts = vec![LIVE_CONDITION.to_string()];
    for (field, predicate) in &filter.all {
        parts.push(condition(q, field, predicate));
    }
    if !filter.any.is_empty() {
        let alternatives: Vec<String> = filter
            .any
            .iter()
            .map(|(field, predicate)| condition(q, field, predicate))
            .collect();
        parts.push(format!("({})", alternatives.join(" OR ")));
    }
    format!(" WHERE {}", parts.join(" AND "))
}

fn projection_expr(q: &mut QueryBuf, projection: &Projection) -> String {
    match projection {
        Projection::All => "doc".to_string(),
        Projection::Include(fields) => {
            let mut keys = fields.clone();
            if !keys.iter().any(|k| k == "id") {
                keys.push("id".to_string());
            }
            let ph = q.push_param(PgBindValue::TextArray(keys));
            format!(
                "COALESCE((SELECT jsonb_object_agg(e.key, e.value) FROM jsonb_each(doc) e WHERE e.key = ANY({})), '{{}}'::jsonb)",
                ph
            )
        }
        Projection::Exclude(fields) => {
            let ph = q.push_param(PgBindValue::TextArray(fields.clone()));
            format!("(doc - {}::text[])", ph)
        }
    }
}

/// SELECT documents matching `filter`, projected, ordered (by `seq` when no sort is given), paged.
pub fn select_records(
    table: &str,
    filter: &RecordFilter,
    projection: &Projection,
    sort: Option<&SortCondition>,
    skip: u64,
    limit: u64,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let proj = projection_expr(&mut q, projection);
    let where_sql = where_clause(&mut q, filter);
    let order_clause = match sort {
        Some(s) => {
            let f = q.push_text(&s.field);
            let dir = match s.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!(" ORDER BY doc->{} {}, seq ASC", f, dir)
        }
        None => " ORDER BY seq ASC".to_string(),
    };
    q.sql = format!(
        "SELECT {} AS doc FROM {}{}{} LIMIT {} OFFSET {}",
        proj, table, where_sql, order_clause, limit, skip
    );
    q
}

/// COUNT of documents matching `filter`; pagination does not apply.
pub fn count_records(table: &str, filter: &RecordFilter) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, filter);
    q.sql = format!("SELECT COUNT(*) AS count FROM {}{}", table, where_sql);
    q
}

/// Bump and return the per-collection id sequence.
pub fn next_sequence(counters_table: &str, collection: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let name = q.push_text(collection);
    q.sql = format!(
        "INSERT INTO {t} (name, sequence) VALUES ({n}, 1) \
         ON CONFLICT (name) DO UPDATE SET sequence = {t}.sequence + 1 RETURNING sequence",
        t = counters_table,
        n = name
    );
    q
}

pub fn insert_record(table: &str, id: &str, doc: &Document) -> QueryBuf {
    let mut q = QueryBuf::new();
    let id_ph = q.push_text(id);
    let doc_ph = q.push_param(PgBindValue::Json(Value::Object(doc.clone())));
    q.sql = format!(
        "INSERT INTO {} (id, doc) VALUES ({}, {}) RETURNING doc",
        table, id_ph, doc_ph
    );
    q
}

/// Merge `patch` into every matching document where some patched key differs from the
/// stored value, stamping `updatedOn`.
pub fn update_records(table: &str, filter: &RecordFilter, patch: &Document, now: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let patch_ph = q.push_param(PgBindValue::Json(Value::Object(patch.clone())));
    let now_ph = q.push_text(now);
    let where_sql = where_clause(&mut q, filter);
    q.sql = format!(
        "UPDATE {t} SET doc = doc || {p}::jsonb || jsonb_build_object('updatedOn', {n}::text){w} AND EXISTS (SELECT 1 FROM jsonb_each({p}::jsonb) e WHERE doc->e.key IS DISTINCT FROM e.value)",
        t = table,
        p = patch_ph,
        n = now_ph,
        w = where_sql
    );
    q
}

/// Soft delete: flag matching live documents inactive and deleted.
pub fn soft_delete_records(table: &str, filter: &RecordFilter, now: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let now_ph = q.push_text(now);
    let where_sql = where_clause(&mut q, filter);
    q.sql = format!(
        "UPDATE {} SET doc = doc || jsonb_build_object('isActive', false, 'isDeleted', true, 'updatedOn', {}::text){}",
        table, now_ph, where_sql
    );
    q
}
