//! Translates client options into a bounded query descriptor.
//!
//! Filter syntax is deliberately permissive: a value that does not parse as one of the
//! comparison forms (`ne:`, `gt:`, `gte:`, `lt:`, `lte:`, `a..b`) is matched literally.

use super::descriptor::{Predicate, Projection, QueryDescriptor, SortCondition, SortDirection};
use super::options::{QueryLimits, QueryOptions};
use crate::error::ServiceError;
use std::collections::BTreeMap;

/// Largest offset a store accepts (PostgreSQL OFFSET is a bigint).
const MAX_SKIP: u64 = i64::MAX as u64;

/// Build a descriptor from `options`. Only a projection mixing inclusion and
/// exclusion is rejected; every other malformed value degrades to a default.
pub fn build_query(options: &QueryOptions, limits: QueryLimits) -> Result<QueryDescriptor, ServiceError> {
    let seek_conditions: BTreeMap<String, Predicate> = options
        .filters()
        .iter()
        .map(|(k, v)| (k.clone(), parse_predicate(v)))
        .collect();

    let limit = parse_limit(options.limit.as_deref(), limits);
    let skip = match options.page.as_deref() {
        Some(page) => {
            let page = page.trim().parse::<i64>().unwrap_or(1).max(1) as u64;
            (page - 1).saturating_mul(limit)
        }
        None => options
            .skip
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(0)
            .max(0) as u64,
    }
    .min(MAX_SKIP);

    Ok(QueryDescriptor {
        seek_conditions,
        fields_to_return: parse_projection(options.fields.as_deref())?,
        sort_condition: parse_sort(options.sort_by.as_deref(), options.sort_order.as_deref()),
        skip,
        limit,
        count: parse_flag(options.count.as_deref()),
    })
}

fn parse_limit(raw: Option<&str>, limits: QueryLimits) -> u64 {
    match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
        Some(n) => n.clamp(1, limits.max_limit as i64) as u64,
        None => limits.default_limit,
    }
}

fn parse_flag(raw: Option<&str>) -> bool {
    raw.map(|s| {
        let s = s.trim();
        s.eq_ignore_ascii_case("true") || s == "1"
    })
    .unwrap_or(false)
}

fn parse_sort(sort_by: Option<&str>, sort_order: Option<&str>) -> Option<SortCondition> {
    let field = sort_by.map(str::trim).filter(|s| !s.is_empty())?;
    let direction = match sort_order.map(str::trim) {
        Some(o) if o.eq_ignore_ascii_case("desc") => SortDirection::Desc,
        _ => SortDirection::Asc,
    };
    Some(SortCondition {
        field: field.to_string(),
        direction,
    })
}

fn parse_projection(raw: Option<&str>) -> Result<Projection, ServiceError> {
    let Some(raw) = raw else {
        return Ok(Projection::All);
    };
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.strip_prefix('-') {
            Some(name) => {
                let name = name.trim();
                if !name.is_empty() {
                    exclude.push(name.to_string());
                }
            }
            None => include.push(part.to_string()),
        }
    }
    match (include.is_empty(), exclude.is_empty()) {
        (true, true) => Ok(Projection::All),
        (false, true) => Ok(Projection::Include(include)),
        (true, false) => Ok(Projection::Exclude(exclude)),
        (false, false) => Err(ServiceError::validation(
            "fields cannot mix included and excluded fields",
        )),
    }
}

fn parse_predicate(raw: &str) -> Predicate {
    const OPERATORS: [(&str, fn(String) -> Predicate); 5] = [
        ("gte:", Predicate::Gte),
        ("lte:", Predicate::Lte),
        ("gt:", Predicate::Gt),
        ("lt:", Predicate::Lt),
        ("ne:", Predicate::Ne),
    ];
    for (prefix, make) in OPERATORS {
        if let Some(operand) = raw.strip_prefix(prefix) {
            if operand.is_empty() {
                break;
            }
            return make(operand.to_string());
        }
    }
    if let Some((low, high)) = raw.split_once("..") {
        if !low.is_empty() && !high.is_empty() && !high.contains("..") {
            return Predicate::Between(low.to_string(), high.to_string());
        }
    }
    Predicate::Eq(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> QueryLimits {
        QueryLimits::new(20, 100)
    }

    fn build(pairs: &[(&str, &str)]) -> QueryDescriptor {
        build_query(&QueryOptions::from_pairs(pairs.iter().copied()), limits()).unwrap()
    }

    #[test]
    fn limit_is_clamped_to_max() {
        assert_eq!(build(&[("limit", "500")]).limit, 100);
        assert_eq!(build(&[("limit", "0")]).limit, 1);
        assert_eq!(build(&[("limit", "-3")]).limit, 1);
        assert_eq!(build(&[("limit", "35")]).limit, 35);
    }

    #[test]
    fn huge_page_or_skip_stays_within_bigint() {
        let d = build(&[("page", "9223372036854775807"), ("limit", "100")]);
        assert_eq!(d.skip, i64::MAX as u64);
        let d = build(&[("skip", "9223372036854775807")]);
        assert_eq!(d.skip, i64::MAX as u64);
    }

    #[test]
    fn missing_or_garbage_limit_uses_default() {
        assert_eq!(build(&[]).limit, 20);
        assert_eq!(build(&[("limit", "lots")]).limit, 20);
    }

    #[test]
    fn page_drives_skip() {
        for (page, limit) in [(1u64, 10u64), (2, 10), (5, 7), (3, 100)] {
            let d = build(&[("page", page.to_string().as_str()), ("limit", limit.to_string().as_str())]);
            assert_eq!(d.skip, (page - 1) * limit, "page {} limit {}", page, limit);
        }
    }

    #[test]
    fn page_takes_precedence_over_skip() {
        let d = build(&[("page", "3"), ("limit", "10"), ("skip", "4")]);
        assert_eq!(d.skip, 20);
    }

    #[test]
    fn page_below_one_starts_at_zero() {
        assert_eq!(build(&[("page", "0"), ("limit", "10")]).skip, 0);
        assert_eq!(build(&[("page", "x")]).skip, 0);
    }

    #[test]
    fn raw_skip_is_non_negative() {
        assert_eq!(build(&[("skip", "15")]).skip, 15);
        assert_eq!(build(&[("skip", "-15")]).skip, 0);
        assert_eq!(build(&[("skip", "abc")]).skip, 0);
    }

    #[test]
    fn sort_desc_and_no_sort() {
        let d = build(&[("sortBy", "name"), ("sortOrder", "DESC")]);
        assert_eq!(
            d.sort_condition,
            Some(SortCondition {
                field: "name".into(),
                direction: SortDirection::Desc
            })
        );
        assert_eq!(d.sort_condition.as_ref().map(|s| s.direction.sign()), Some(-1));
        assert_eq!(build(&[]).sort_condition, None);
        assert_eq!(build(&[("sortOrder", "desc")]).sort_condition, None);
    }

    #[test]
    fn sort_defaults_to_ascending() {
        let d = build(&[("sortBy", "name"), ("sortOrder", "sideways")]);
        assert_eq!(d.sort_condition.unwrap().direction, SortDirection::Asc);
    }

    #[test]
    fn projection_include_exclude() {
        assert_eq!(
            build(&[("fields", "firstName, email,")]).fields_to_return,
            Projection::Include(vec!["firstName".into(), "email".into()])
        );
        assert_eq!(
            build(&[("fields", "-password,-timeStamp")]).fields_to_return,
            Projection::Exclude(vec!["password".into(), "timeStamp".into()])
        );
        assert_eq!(build(&[("fields", " , ")]).fields_to_return, Projection::All);
    }

    #[test]
    fn mixed_projection_is_a_validation_error() {
        let options = QueryOptions::new().with("fields", "email,-password");
        let err = build_query(&options, limits()).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn count_flag() {
        assert!(build(&[("count", "true")]).count);
        assert!(build(&[("count", "TRUE")]).count);
        assert!(build(&[("count", "1")]).count);
        assert!(!build(&[("count", "false")]).count);
        assert!(!build(&[("count", "yes")]).count);
        assert!(!build(&[]).count);
    }

    #[test]
    fn filters_become_predicates() {
        let d = build(&[
            ("email", "a@b.com"),
            ("age", "gte:18"),
            ("score", "lt:3.5"),
            ("status", "ne:archived"),
            ("year", "1990..2000"),
        ]);
        assert_eq!(d.seek_conditions.get("email"), Some(&Predicate::Eq("a@b.com".into())));
        assert_eq!(d.seek_conditions.get("age"), Some(&Predicate::Gte("18".into())));
        assert_eq!(d.seek_conditions.get("score"), Some(&Predicate::Lt("3.5".into())));
        assert_eq!(d.seek_conditions.get("status"), Some(&Predicate::Ne("archived".into())));
        assert_eq!(
            d.seek_conditions.get("year"),
            Some(&Predicate::Between("1990".into(), "2000".into()))
        );
    }

    #[test]
    fn malformed_comparisons_match_literally() {
        let d = build(&[("a", "gt:"), ("b", "..5"), ("c", "1..2..3"), ("d", "gtx:4")]);
        assert_eq!(d.seek_conditions.get("a"), Some(&Predicate::Eq("gt:".into())));
        assert_eq!(d.seek_conditions.get("b"), Some(&Predicate::Eq("..5".into())));
        assert_eq!(d.seek_conditions.get("c"), Some(&Predicate::Eq("1..2..3".into())));
        assert_eq!(d.seek_conditions.get("d"), Some(&Predicate::Eq("gtx:4".into())));
    }

    #[test]
    fn same_input_same_descriptor() {
        let pairs = [("email", "a@b.com"), ("sortBy", "name"), ("page", "2"), ("fields", "-password")];
        assert_eq!(build(&pairs), build(&pairs));
    }

    #[test]
    fn email_filter_with_oversized_limit() {
        let d = build(&[("email", "a@b.com"), ("limit", "500")]);
        assert_eq!(d.limit, 100);
        assert_eq!(d.seek_conditions.len(), 1);
        assert_eq!(d.seek_conditions.get("email"), Some(&Predicate::Eq("a@b.com".into())));
    }
}
