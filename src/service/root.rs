//! Generic response normalization shared by every entity service.

use crate::error::ServiceError;
use crate::events::EventBus;
use crate::query::{build_query, QueryLimits, QueryOptions, RecordFilter};
use crate::response::ResponseEnvelope;
use crate::store::{Document, ReadOutcome, RecordController, WriteAck};
use axum::http::StatusCode;
use serde_json::Value;

/// How much of an error reaches the client. Verbose prefixes `[service] function:`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorVerbosity {
    Verbose,
    Terse,
}

#[derive(Clone, Debug)]
pub struct NormalizerPolicy {
    pub verbosity: ErrorVerbosity,
    /// Status of a delete that modified nothing. Defaults to 200.
    pub delete_failure_status: StatusCode,
    pub limits: QueryLimits,
}

impl Default for NormalizerPolicy {
    fn default() -> Self {
        NormalizerPolicy {
            verbosity: ErrorVerbosity::Terse,
            delete_failure_status: StatusCode::OK,
            limits: QueryLimits::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormattedError {
    pub message: String,
    pub status: StatusCode,
}

impl FormattedError {
    pub fn into_envelope(self) -> ResponseEnvelope {
        ResponseEnvelope::failure(self.message, self.status)
    }
}

#[derive(Clone)]
pub struct ResponseNormalizer {
    policy: NormalizerPolicy,
    events: EventBus,
}

impl ResponseNormalizer {
    pub fn new(policy: NormalizerPolicy, events: EventBus) -> Self {
        ResponseNormalizer { policy, events }
    }

    pub fn policy(&self) -> &NormalizerPolicy {
        &self.policy
    }

    pub fn process_single_read(&self, result: Option<Document>) -> ResponseEnvelope {
        let has_id = result
            .as_ref()
            .and_then(|doc| doc.get("id"))
            .map(|id| match id {
                Value::String(s) => !s.is_empty(),
                Value::Null => false,
                _ => true,
            })
            .unwrap_or(false);
        match result {
            Some(doc) if has_id => ResponseEnvelope::success(Value::Object(doc)),
            _ => ResponseEnvelope::failure("Resource not found", StatusCode::NOT_FOUND),
        }
    }

    /// Any document list (even empty) succeeds; a count succeeds only when non-zero.
    pub fn process_multiple_read_results(&self, result: Option<ReadOutcome>) -> ResponseEnvelope {
        match result {
            Some(ReadOutcome::Count(0)) | None => {
                ResponseEnvelope::failure("Resources not found", StatusCode::NOT_FOUND)
            }
            Some(outcome) => ResponseEnvelope::success(outcome.into_payload()),
        }
    }

    /// On a real modification, emits `event_name` (if any) carrying the ack.
    pub fn process_update_result(&self, result: Option<WriteAck>, event_name: Option<&str>) -> ResponseEnvelope {
        match result {
            Some(ack) if ack.ok && ack.n_modified > 0 => {
                let payload = ack_payload(&ack);
                if let Some(name) = event_name {
                    self.events.emit(name, payload.clone());
                }
                ResponseEnvelope::success(payload)
            }
            Some(ack) if ack.ok => ResponseEnvelope::success_with_status(ack_payload(&ack), StatusCode::NO_CONTENT),
            _ => ResponseEnvelope::failure("Update failed", StatusCode::BAD_REQUEST),
        }
    }

    /// A delete that modified nothing fails with the configured status (200 unless overridden).
    pub fn process_delete_result(&self, result: Option<WriteAck>) -> ResponseEnvelope {
        match result {
            Some(ack) if ack.n_modified > 0 => ResponseEnvelope::success(ack_payload(&ack)),
            _ => ResponseEnvelope::failure("Deletion failed.", self.policy.delete_failure_status),
        }
    }

    pub fn format_error(&self, service_name: &str, error: &ServiceError, function_name: &str) -> FormattedError {
        let message = match self.policy.verbosity {
            ErrorVerbosity::Verbose => format!("[{}] {}: {}", service_name, function_name, error),
            ErrorVerbosity::Terse => error.to_string(),
        };
        FormattedError {
            message,
            status: error.status(),
        }
    }

    /// Build the query from `options`, AND-combine `extra` (which wins on shared fields),
    /// and hand the result of the read back unnormalized.
    pub async fn handle_database_read(
        &self,
        controller: &dyn RecordController,
        options: &QueryOptions,
        extra: RecordFilter,
    ) -> Result<ReadOutcome, ServiceError> {
        let descriptor = build_query(options, self.policy.limits)?;
        let filter = RecordFilter::from_conditions(descriptor.seek_conditions).merge(extra);
        let outcome = controller
            .read_records(
                &filter,
                &descriptor.fields_to_return,
                descriptor.sort_condition.as_ref(),
                descriptor.count,
                descriptor.skip,
                descriptor.limit,
            )
            .await?;
        Ok(outcome)
    }
}

fn ack_payload(ack: &WriteAck) -> Value {
    serde_json::to_value(ack).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControllerError;
    use crate::query::Predicate;
    use crate::store::MemoryRecordController;
    use serde_json::json;

    fn normalizer(verbosity: ErrorVerbosity) -> ResponseNormalizer {
        ResponseNormalizer::new(
            NormalizerPolicy {
                verbosity,
                ..Default::default()
            },
            EventBus::default(),
        )
    }

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn single_read() {
        let n = normalizer(ErrorVerbosity::Terse);
        let ok = n.process_single_read(Some(doc(json!({ "id": "1" }))));
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.payload(), Some(&json!({ "id": "1" })));

        for missing in [None, Some(doc(json!({ "id": "" }))), Some(doc(json!({ "name": "x" })))] {
            let failed = n.process_single_read(missing);
            assert_eq!(failed.status(), StatusCode::NOT_FOUND);
            assert_eq!(failed.error(), Some("Resource not found"));
        }
    }

    #[test]
    fn multiple_reads() {
        let n = normalizer(ErrorVerbosity::Terse);
        assert_eq!(
            n.process_multiple_read_results(Some(ReadOutcome::Documents(vec![]))).status(),
            StatusCode::OK
        );
        let counted = n.process_multiple_read_results(Some(ReadOutcome::Count(3)));
        assert_eq!(counted.payload(), Some(&json!({ "count": 3 })));
        for missing in [None, Some(ReadOutcome::Count(0))] {
            let failed = n.process_multiple_read_results(missing);
            assert_eq!(failed.status(), StatusCode::NOT_FOUND);
            assert_eq!(failed.error(), Some("Resources not found"));
        }
    }

    #[tokio::test]
    async fn update_results_and_event() {
        let n = normalizer(ErrorVerbosity::Terse);
        let mut rx = n.events.subscribe();

        let changed = n.process_update_result(Some(WriteAck::modified(2)), Some("samples.updated"));
        assert_eq!(changed.status(), StatusCode::OK);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, "samples.updated");
        assert_eq!(event.payload, json!({ "ok": true, "nModified": 2 }));

        let unchanged = n.process_update_result(Some(WriteAck::modified(0)), Some("samples.updated"));
        assert_eq!(unchanged.status(), StatusCode::NO_CONTENT);
        assert!(rx.try_recv().is_err());

        let rejected = n.process_update_result(Some(WriteAck { ok: false, n_modified: 0 }), None);
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rejected.error(), Some("Update failed"));
        assert_eq!(n.process_update_result(None, None).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn delete_failure_keeps_configured_status() {
        let n = normalizer(ErrorVerbosity::Terse);
        assert_eq!(n.process_delete_result(Some(WriteAck::modified(1))).status(), StatusCode::OK);
        let failed = n.process_delete_result(Some(WriteAck::modified(0)));
        assert_eq!(failed.status(), StatusCode::OK);
        assert_eq!(failed.error(), Some("Deletion failed."));

        let strict = ResponseNormalizer::new(
            NormalizerPolicy {
                delete_failure_status: StatusCode::NOT_FOUND,
                ..Default::default()
            },
            EventBus::default(),
        );
        assert_eq!(strict.process_delete_result(None).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn error_formatting_follows_verbosity() {
        let err = ServiceError::validation("Email is required");
        let verbose = normalizer(ErrorVerbosity::Verbose).format_error("SampleService", &err, "createRecord");
        assert_eq!(verbose.message, "[SampleService] createRecord: Email is required");
        assert_eq!(verbose.status, StatusCode::PRECONDITION_FAILED);

        let terse = normalizer(ErrorVerbosity::Terse).format_error("SampleService", &err, "createRecord");
        assert_eq!(terse.message, "Email is required");

        let db = ServiceError::from(ControllerError::Failed("connection reset".into()));
        let formatted = normalizer(ErrorVerbosity::Terse).format_error("SampleService", &db, "readRecordById");
        assert_eq!(formatted.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(formatted.into_envelope().error(), Some("connection reset"));
    }

    #[tokio::test]
    async fn database_read_merges_extra_conditions() {
        let n = normalizer(ErrorVerbosity::Terse);
        let store = MemoryRecordController::new("samples");
        for email in ["a@b.com", "c@d.com"] {
            store.create_record(doc(json!({ "email": email }))).await.unwrap();
        }
        let options = QueryOptions::new().with("email", "a@b.com");
        let extra = RecordFilter::new().eq("id", "2");
        let outcome = n.handle_database_read(&store, &options, extra).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Documents(vec![]));

        let mut extra = RecordFilter::new();
        extra.all.insert("email".into(), Predicate::Contains("D.COM".into()));
        let outcome = n.handle_database_read(&store, &options, extra).await.unwrap();
        let ReadOutcome::Documents(docs) = outcome else { panic!("expected documents") };
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["email"], json!("c@d.com"));
    }

    #[tokio::test]
    async fn database_read_rejects_mixed_projection_before_reading() {
        let n = normalizer(ErrorVerbosity::Terse);
        let store = MemoryRecordController::new("samples");
        let options = QueryOptions::new().with("fields", "email,-password");
        let err = n.handle_database_read(&store, &options, RecordFilter::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
