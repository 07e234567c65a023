//! In-process record controller. Evaluates query descriptors directly with the same
//! comparison rules as the PostgreSQL translation; used for tests and for running
//! without a database (`STORE_BACKEND=memory`). Text ranges compare bytes, matching the
//! `COLLATE "C"` the SQL translation applies.

use super::{sanitize_patch, stamp_new, Document, ReadOutcome, RecordController, WriteAck};
use crate::error::ControllerError;
use crate::query::{Predicate, Projection, RecordFilter, SortCondition, SortDirection};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Collection {
    sequence: u64,
    /// Insertion order is the natural order.
    docs: Vec<Document>,
}

pub struct MemoryRecordController {
    collection: String,
    state: Mutex<Collection>,
}

impl MemoryRecordController {
    pub fn new(collection: &str) -> Self {
        MemoryRecordController {
            collection: collection.to_string(),
            state: Mutex::new(Collection::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collection>, ControllerError> {
        self.state
            .lock()
            .map_err(|_| ControllerError::Failed(format!("{}: store lock poisoned", self.collection)))
    }
}

/// Text form of a stored value, as PostgreSQL's `->>` would render it.
fn text_of(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn as_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn compare_to(field: Option<&Value>, operand: &str) -> Option<Ordering> {
    match as_number(operand) {
        Some(n) => field.and_then(Value::as_f64).and_then(|f| f.partial_cmp(&n)),
        None => field.and_then(text_of).map(|t| t.as_str().cmp(operand)),
    }
}

fn is_live(doc: &Document) -> bool {
    doc.get("isDeleted") != Some(&Value::Bool(true))
}

fn predicate_holds(doc: &Document, field: &str, predicate: &Predicate) -> bool {
    let value = doc.get(field);
    match predicate {
        Predicate::Eq(v) => value.and_then(text_of).as_deref() == Some(v.as_str()),
        Predicate::Ne(v) => value.and_then(text_of).as_deref() != Some(v.as_str()),
        Predicate::Gt(v) => compare_to(value, v) == Some(Ordering::Greater),
        Predicate::Gte(v) => matches!(compare_to(value, v), Some(Ordering::Greater | Ordering::Equal)),
        Predicate::Lt(v) => compare_to(value, v) == Some(Ordering::Less),
        Predicate::Lte(v) => matches!(compare_to(value, v), Some(Ordering::Less | Ordering::Equal)),
        Predicate::Between(low, high) => {
            if as_number(low).is_some() && as_number(high).is_some() {
                matches!(compare_to(value, low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare_to(value, high), Some(Ordering::Less | Ordering::Equal))
            } else {
                value
                    .and_then(text_of)
                    .map(|t| t.as_str() >= low.as_str() && t.as_str() <= high.as_str())
                    .unwrap_or(false)
            }
        }
        Predicate::Contains(keyword) => value
            .and_then(text_of)
            .map(|t| t.to_lowercase().contains(&keyword.to_lowercase()))
            .unwrap_or(false),
    }
}

fn filter_holds(doc: &Document, filter: &RecordFilter) -> bool {
    is_live(doc)
        && filter.all.iter().all(|(f, p)| predicate_holds(doc, f, p))
        && (filter.any.is_empty() || filter.any.iter().any(|(f, p)| predicate_holds(doc, f, p)))
}

/// Rank of a JSON type in PostgreSQL's jsonb ordering.
fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// jsonb-like ordering; a missing field sorts after every present value.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => type_rank(a)
                .cmp(&type_rank(b))
                .then_with(|| a.to_string().cmp(&b.to_string())),
        },
    }
}

fn project(doc: &Document, projection: &Projection) -> Document {
    match projection {
        Projection::All => doc.clone(),
        Projection::Include(fields) => doc
            .iter()
            .filter(|(k, _)| k.as_str() == "id" || fields.iter().any(|f| f == *k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        Projection::Exclude(fields) => doc
            .iter()
            .filter(|(k, _)| !fields.iter().any(|f| f == *k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

#[async_trait]
impl RecordController for MemoryRecordController {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn create_record(&self, doc: Document) -> Result<Document, ControllerError> {
        let mut state = self.lock()?;
        state.sequence += 1;
        let doc = stamp_new(doc, state.sequence, Utc::now());
        state.docs.push(doc.clone());
        tracing::debug!(collection = %self.collection, id = state.sequence, "record created");
        Ok(doc)
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
        let state = self.lock()?;
        let mut matched: Vec<&Document> = state.docs.iter().filter(|d| filter_holds(d, filter)).collect();
        if is_count {
            return Ok(ReadOutcome::Count(matched.len() as u64));
        }
        if let Some(sort) = sort {
            matched.sort_by(|a, b| {
                let ord = compare_field(a.get(&sort.field), b.get(&sort.field));
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        let docs = matched
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .map(|d| project(d, projection))
            .collect();
        Ok(ReadOutcome::Documents(docs))
    }

    async fn update_records(&self, filter: &RecordFilter, patch: Document) -> Result<WriteAck, ControllerError> {
        let patch = sanitize_patch(patch);
        if patch.is_empty() {
            return Ok(WriteAck::modified(0));
        }
        let now = Utc::now().to_rfc3339();
        let mut state = self.lock()?;
        let mut modified = 0;
        for doc in state.docs.iter_mut().filter(|d| filter_holds(d, filter)) {
            let changes = patch.iter().any(|(k, v)| doc.get(k) != Some(v));
            if !changes {
                continue;
            }
            for (k, v) in &patch {
                doc.insert(k.clone(), v.clone());
            }
            doc.insert("updatedOn".into(), Value::String(now.clone()));
            modified += 1;
        }
        Ok(WriteAck::modified(modified))
    }

    async fn delete_records(&self, filter: &RecordFilter) -> Result<WriteAck, ControllerError> {
        let now = Utc::now().to_rfc3339();
        let mut state = self.lock()?;
        let mut modified = 0;
        for doc in state.docs.iter_mut().filter(|d| filter_holds(d, filter)) {
            doc.insert("isActive".into(), Value::Bool(false));
            doc.insert("isDeleted".into(), Value::Bool(true));
            doc.insert("updatedOn".into(), Value::String(now.clone()));
            modified += 1;
        }
        Ok(WriteAck::modified(modified))
    }

    async fn ping(&self) -> Result<(), ControllerError> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::WildcardCondition;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    async fn seeded() -> MemoryRecordController {
        let store = MemoryRecordController::new("people");
        for (name, age, email) in [
            ("Ada", 36, "ada@math.org"),
            ("Grace", 45, "grace@navy.mil"),
            ("Alan", 41, "alan@bletchley.uk"),
            ("Linus", 21, "linus@kernel.org"),
        ] {
            store
                .create_record(doc(json!({ "name": name, "age": age, "email": email })))
                .await
                .unwrap();
        }
        store
    }

    async fn read(store: &MemoryRecordController, filter: &RecordFilter, sort: Option<&SortCondition>) -> Vec<Document> {
        match store
            .read_records(filter, &Projection::All, sort, false, 0, 100)
            .await
            .unwrap()
        {
            ReadOutcome::Documents(d) => d,
            ReadOutcome::Count(_) => panic!("expected documents"),
        }
    }

    fn names(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d["name"].as_str().unwrap()).collect()
    }

    #[tokio::test]
    async fn ids_are_sequential() {
        let store = seeded().await;
        let docs = read(&store, &RecordFilter::new(), None).await;
        let ids: Vec<&str> = docs.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn equality_matches_text_of_numbers_and_bools() {
        let store = seeded().await;
        let docs = read(&store, &RecordFilter::new().eq("age", "41"), None).await;
        assert_eq!(names(&docs), vec!["Alan"]);
        let docs = read(&store, &RecordFilter::new().eq("isActive", "true"), None).await;
        assert_eq!(docs.len(), 4);
    }

    #[tokio::test]
    async fn numeric_ranges() {
        let store = seeded().await;
        let mut filter = RecordFilter::new();
        filter.all.insert("age".into(), Predicate::Gte("40".into()));
        assert_eq!(names(&read(&store, &filter, None).await), vec!["Grace", "Alan"]);

        let mut filter = RecordFilter::new();
        filter.all.insert("age".into(), Predicate::Between("21".into(), "36".into()));
        assert_eq!(names(&read(&store, &filter, None).await), vec!["Ada", "Linus"]);
    }

    #[tokio::test]
    async fn wildcard_is_case_insensitive_or() {
        let store = seeded().await;
        let wildcard = WildcardCondition {
            fields: vec!["name".into(), "email".into()],
            keyword: "ORG".into(),
        };
        let filter = RecordFilter::new().matching_any(&wildcard);
        assert_eq!(names(&read(&store, &filter, None).await), vec!["Ada", "Linus"]);
    }

    #[tokio::test]
    async fn sort_and_page() {
        let store = seeded().await;
        let sort = SortCondition {
            field: "age".into(),
            direction: SortDirection::Desc,
        };
        let out = store
            .read_records(&RecordFilter::new(), &Projection::All, Some(&sort), false, 1, 2)
            .await
            .unwrap();
        let ReadOutcome::Documents(docs) = out else { panic!("expected documents") };
        assert_eq!(names(&docs), vec!["Alan", "Ada"]);
    }

    #[tokio::test]
    async fn projection_keeps_id() {
        let store = seeded().await;
        let out = store
            .read_records(
                &RecordFilter::new().eq("name", "Ada"),
                &Projection::Include(vec!["email".into()]),
                None,
                false,
                0,
                10,
            )
            .await
            .unwrap();
        let ReadOutcome::Documents(docs) = out else { panic!("expected documents") };
        assert_eq!(docs[0].len(), 2);
        assert_eq!(docs[0]["id"], json!("1"));
        assert_eq!(docs[0]["email"], json!("ada@math.org"));
    }

    #[tokio::test]
    async fn count_ignores_paging() {
        let store = seeded().await;
        let out = store
            .read_records(&RecordFilter::new(), &Projection::All, None, true, 3, 1)
            .await
            .unwrap();
        assert_eq!(out, ReadOutcome::Count(4));
    }

    #[tokio::test]
    async fn update_counts_only_real_changes() {
        let store = seeded().await;
        let filter = RecordFilter::new().eq("id", "1");
        let ack = store
            .update_records(&filter, doc(json!({ "email": "ada@math.org" })))
            .await
            .unwrap();
        assert_eq!(ack, WriteAck::modified(0));
        let ack = store
            .update_records(&filter, doc(json!({ "email": "countess@math.org", "id": "99" })))
            .await
            .unwrap();
        assert_eq!(ack, WriteAck::modified(1));
        let docs = read(&store, &filter, None).await;
        assert_eq!(docs[0]["email"], json!("countess@math.org"));
    }

    #[tokio::test]
    async fn update_replaces_arrays_and_objects_that_shrink() {
        let store = MemoryRecordController::new("posts");
        store
            .create_record(doc(json!({ "tags": ["a", "b"], "meta": { "x": 1, "y": 2 } })))
            .await
            .unwrap();
        let filter = RecordFilter::new().eq("id", "1");
        let ack = store.update_records(&filter, doc(json!({ "tags": ["a"] }))).await.unwrap();
        assert_eq!(ack, WriteAck::modified(1));
        let ack = store.update_records(&filter, doc(json!({ "meta": { "x": 1 } }))).await.unwrap();
        assert_eq!(ack, WriteAck::modified(1));
        let docs = read(&store, &filter, None).await;
        assert_eq!(docs[0]["tags"], json!(["a"]));
        assert_eq!(docs[0]["meta"], json!({ "x": 1 }));
    }

    #[tokio::test]
    async fn text_ranges_use_byte_order() {
        let store = seeded().await;
        let mut filter = RecordFilter::new();
        filter.all.insert("name".into(), Predicate::Lt("a".into()));
        assert_eq!(names(&read(&store, &filter, None).await), vec!["Ada", "Grace", "Alan", "Linus"]);
    }

    #[tokio::test]
    async fn soft_deleted_documents_disappear() {
        let store = seeded().await;
        let ack = store.delete_records(&RecordFilter::new().eq("name", "Grace")).await.unwrap();
        assert_eq!(ack.n_modified, 1);
        let again = store.delete_records(&RecordFilter::new().eq("name", "Grace")).await.unwrap();
        assert_eq!(again.n_modified, 0);
        assert_eq!(names(&read(&store, &RecordFilter::new(), None).await), vec!["Ada", "Alan", "Linus"]);
    }
}
