//! `/samples` handlers: extract path, query and body, then delegate to `SampleService`.

use crate::query::QueryOptions;
use crate::response::ResponseEnvelope;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::Value;

type QueryPairs = Query<Vec<(String, String)>>;

/// An empty body reads as `null` so the service can report what it expected.
fn parse_body(bytes: &Bytes) -> Result<Value, ResponseEnvelope> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|e| ResponseEnvelope::failure(format!("Invalid JSON body: {}", e), StatusCode::BAD_REQUEST))
}

pub async fn create(State(state): State<AppState>, body: Bytes) -> ResponseEnvelope {
    match parse_body(&body) {
        Ok(body) => state.samples.create_record(body).await,
        Err(rejected) => rejected,
    }
}

pub async fn list(State(state): State<AppState>, Query(pairs): QueryPairs) -> ResponseEnvelope {
    state.samples.read_records_by_filter(QueryOptions::from_pairs(pairs)).await
}

pub async fn read(State(state): State<AppState>, Path(id): Path<String>) -> ResponseEnvelope {
    state.samples.read_record_by_id(&id).await
}

pub async fn search(
    State(state): State<AppState>,
    Path((keys, keyword)): Path<(String, String)>,
    Query(pairs): QueryPairs,
) -> ResponseEnvelope {
    state
        .samples
        .read_records_by_wildcard(&keys, &keyword, QueryOptions::from_pairs(pairs))
        .await
}

pub async fn update_many(State(state): State<AppState>, body: Bytes) -> ResponseEnvelope {
    match parse_body(&body) {
        Ok(body) => state.samples.update_records(body).await,
        Err(rejected) => rejected,
    }
}

pub async fn update(State(state): State<AppState>, Path(id): Path<String>, body: Bytes) -> ResponseEnvelope {
    match parse_body(&body) {
        Ok(body) => state.samples.update_record_by_id(&id, body).await,
        Err(rejected) => rejected,
    }
}

pub async fn delete_many(State(state): State<AppState>, body: Bytes) -> ResponseEnvelope {
    match parse_body(&body) {
        Ok(body) => state.samples.delete_records(body).await,
        Err(rejected) => rejected,
    }
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ResponseEnvelope {
    state.samples.delete_record_by_id(&id).await
}
