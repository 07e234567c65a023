//! Keyword search across several fields.

use super::descriptor::WildcardCondition;
use crate::error::ServiceError;

/// Wildcard search over a comma-separated field list. Empty key sets and blank
/// keywords are rejected rather than matching nothing.
pub fn build_wildcard_options(keys: &str, keyword: &str) -> Result<WildcardCondition, ServiceError> {
    let fields: Vec<String> = keys
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();
    if fields.is_empty() {
        return Err(ServiceError::validation("Keys are required to read"));
    }
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(ServiceError::validation("Keyword is required to read"));
    }
    Ok(WildcardCondition {
        fields,
        keyword: keyword.to_string(),
    })
}
