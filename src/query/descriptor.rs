//! Storage-agnostic query descriptor: the only contract between query building and data access.

use serde::Serialize;
use std::collections::BTreeMap;

/// One condition on a document field. Operands are kept as text; each store decides
/// how to compare (numerically when the operand parses as a number and the field holds one).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    Eq(String),
    Ne(String),
    Gt(String),
    Gte(String),
    Lt(String),
    Lte(String),
    /// Inclusive on both ends.
    Between(String, String),
    /// Case-insensitive substring match.
    Contains(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// +1 for ascending, -1 for descending.
    pub fn sign(self) -> i8 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SortCondition {
    pub field: String,
    pub direction: SortDirection,
}

/// Fields to return. Inclusion always keeps the document `id`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "fields", rename_all = "snake_case")]
pub enum Projection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueryDescriptor {
    pub seek_conditions: BTreeMap<String, Predicate>,
    pub fields_to_return: Projection,
    /// `None` means natural (insertion) order.
    pub sort_condition: Option<SortCondition>,
    pub skip: u64,
    pub limit: u64,
    /// Return a cardinality instead of documents.
    pub count: bool,
}

/// OR-set of case-insensitive "contains" predicates, one per field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WildcardCondition {
    pub fields: Vec<String>,
    pub keyword: String,
}

impl WildcardCondition {
    pub fn predicates(&self) -> impl Iterator<Item = (String, Predicate)> + '_ {
        self.fields
            .iter()
            .map(|f| (f.clone(), Predicate::Contains(self.keyword.clone())))
    }
}

/// Filter handed to a record controller: every `all` condition must hold, and when
/// `any` is non-empty at least one of its conditions must hold as well.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RecordFilter {
    pub all: BTreeMap<String, Predicate>,
    pub any: Vec<(String, Predicate)>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_conditions(all: BTreeMap<String, Predicate>) -> Self {
        RecordFilter { all, any: Vec::new() }
    }

    pub fn eq(mut self, field: &str, value: impl Into<String>) -> Self {
        self.all.insert(field.to_string(), Predicate::Eq(value.into()));
        self
    }

    pub fn matching_any(mut self, wildcard: &WildcardCondition) -> Self {
        self.any.extend(wildcard.predicates());
        self
    }

    /// AND-combine `extra` into this filter. A field constrained by `extra` replaces
    /// this filter's condition on the same field.
    pub fn merge(mut self, extra: RecordFilter) -> Self {
        self.all.extend(extra.all);
        self.any.extend(extra.any);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.any.is_empty()
    }
}
