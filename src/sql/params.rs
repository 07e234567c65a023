//! Values bound to document queries.

use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

/// A value bound as a query parameter. Field names, operands and patterns are text;
/// projections are text arrays; patches and new documents are JSONB.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Text(String),
    TextArray(Vec<String>),
    Json(Value),
}

/// Bind `params` in order ($1, $2, ...).
pub fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [PgBindValue],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = match p {
            PgBindValue::Text(s) => query.bind(s.as_str()),
            PgBindValue::TextArray(v) => query.bind(v),
            PgBindValue::Json(v) => query.bind(v),
        };
    }
    query
}
