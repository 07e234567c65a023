//! Client-supplied query options, partitioned into control keys and filters.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Keys reserved for pagination, sorting, projection and counting. Never treated as filters.
pub const CONTROL_KEYS: &[&str] = &["limit", "skip", "page", "sortBy", "sortOrder", "fields", "count"];

/// Page size bounds applied by the query builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryLimits {
    /// Used when the client sends no (or an unparseable) `limit`.
    pub default_limit: u64,
    /// Upper bound; larger requests are clamped to it.
    pub max_limit: u64,
}

impl QueryLimits {
    /// Builds limits with `max_limit >= 1` and `default_limit` inside `[1, max_limit]`.
    pub fn new(default_limit: u64, max_limit: u64) -> Self {
        let max_limit = max_limit.max(1);
        QueryLimits {
            default_limit: default_limit.clamp(1, max_limit),
            max_limit,
        }
    }
}

impl Default for QueryLimits {
    fn default() -> Self {
        QueryLimits::new(20, 100)
    }
}

/// Raw options as received from a query string or a JSON `options` object.
/// Control values stay unparsed strings here; the builder interprets them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub limit: Option<String>,
    pub skip: Option<String>,
    pub page: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub fields: Option<String>,
    pub count: Option<String>,
    filters: BTreeMap<String, String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition key/value pairs. A later duplicate key replaces an earlier one; empty keys are dropped.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut options = QueryOptions::default();
        for (k, v) in pairs {
            options.set(k.into(), v.into());
        }
        options
    }

    /// Options from a JSON object (bulk update/delete bodies). Strings are taken as-is,
    /// other scalars by their JSON text; nulls are skipped.
    pub fn from_json_object(map: &Map<String, Value>) -> Self {
        let mut options = QueryOptions::default();
        for (k, v) in map {
            let text = match v {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            options.set(k.clone(), text);
        }
        options
    }

    /// Adds one pair; reserved keys fill control slots, everything else becomes a filter.
    pub fn set(&mut self, key: String, value: String) {
        let slot = match key.as_str() {
            "limit" => &mut self.limit,
            "skip" => &mut self.skip,
            "page" => &mut self.page,
            "sortBy" => &mut self.sort_by,
            "sortOrder" => &mut self.sort_order,
            "fields" => &mut self.fields,
            "count" => &mut self.count,
            "" => return,
            _ => {
                self.filters.insert(key, value);
                return;
            }
        };
        *slot = Some(value);
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.set(key.to_string(), value.to_string());
        self
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
            && self.limit.is_none()
            && self.skip.is_none()
            && self.page.is_none()
            && self.sort_by.is_none()
            && self.sort_order.is_none()
            && self.fields.is_none()
            && self.count.is_none()
    }
}
