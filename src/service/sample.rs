//! Sample entity service: validation and orchestration over a record controller.

use super::root::ResponseNormalizer;
use super::validation::{RequestValidator, Schema, ValidationRule};
use crate::error::ServiceError;
use crate::query::{build_query, build_wildcard_options, Projection, QueryOptions, RecordFilter};
use crate::response::ResponseEnvelope;
use crate::store::{Document, ReadOutcome, RecordController};
use serde_json::Value;
use std::sync::Arc;

pub const SERVICE_NAME: &str = "SampleService";
pub const COLLECTION: &str = "samples";
pub const UPDATED_EVENT: &str = "samples.updated";

/// Stored but never returned.
const SENSITIVE_FIELDS: &[&str] = &["password"];

fn create_schema() -> Schema {
    Schema::new()
        .field("firstName", ValidationRule::string("First Name").required())
        .field("lastName", ValidationRule::string("Last Name").required())
        .field("email", ValidationRule::string("Email").required().email())
        .field("password", ValidationRule::string("Password").required().length(6, 16))
        .field(
            "confirmPassword",
            ValidationRule::any("Confirm password")
                .required()
                .equals("password", "Confirm password does not match"),
        )
}

fn update_schema() -> Schema {
    Schema::new()
        .field("email", ValidationRule::string("Email").required().email())
        .field("password", ValidationRule::string("Password").required().length(6, 16))
}

fn redact(mut doc: Document) -> Document {
    for field in SENSITIVE_FIELDS {
        doc.remove(*field);
    }
    doc
}

fn redact_outcome(outcome: ReadOutcome) -> ReadOutcome {
    match outcome {
        ReadOutcome::Documents(docs) => ReadOutcome::Documents(docs.into_iter().map(redact).collect()),
        count => count,
    }
}

/// Non-empty JSON object, or `None`.
fn non_empty_object(value: Option<&Value>) -> Option<&Document> {
    value.and_then(Value::as_object).filter(|m| !m.is_empty())
}

fn require_id(id: &str) -> Result<&str, ServiceError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ServiceError::validation("Invalid ID supplied."));
    }
    Ok(id)
}

pub struct SampleService {
    controller: Arc<dyn RecordController>,
    normalizer: ResponseNormalizer,
    create_schema: Schema,
    update_schema: Schema,
}

impl SampleService {
    pub fn new(controller: Arc<dyn RecordController>, normalizer: ResponseNormalizer) -> Self {
        SampleService {
            controller,
            normalizer,
            create_schema: create_schema(),
            update_schema: update_schema(),
        }
    }

    pub fn controller(&self) -> &Arc<dyn RecordController> {
        &self.controller
    }

    fn finish(&self, function_name: &str, result: Result<ResponseEnvelope, ServiceError>) -> ResponseEnvelope {
        match result {
            Ok(envelope) => envelope,
            Err(e) => {
                match &e {
                    ServiceError::Controller(inner) => {
                        tracing::warn!(
                            service = SERVICE_NAME,
                            collection = self.controller.collection(),
                            function = function_name,
                            error = %inner,
                            "controller failure"
                        )
                    }
                    other => tracing::debug!(service = SERVICE_NAME, function = function_name, error = %other, "request rejected"),
                }
                self.normalizer.format_error(SERVICE_NAME, &e, function_name).into_envelope()
            }
        }
    }

    pub async fn create_record(&self, body: Value) -> ResponseEnvelope {
        let result = self.try_create_record(body).await;
        self.finish("createRecord", result)
    }

    async fn try_create_record(&self, body: Value) -> Result<ResponseEnvelope, ServiceError> {
        let Some(mut doc) = non_empty_object(Some(&body)).cloned() else {
            return Err(ServiceError::validation("Data is required to create."));
        };
        doc.remove("id");
        RequestValidator::validate(&doc, &self.create_schema)?;
        doc.remove("confirmPassword");
        let created = self.controller.create_record(doc).await?;
        Ok(self.normalizer.process_single_read(Some(redact(created))))
    }

    pub async fn read_record_by_id(&self, id: &str) -> ResponseEnvelope {
        let result = self.try_read_record_by_id(id).await;
        self.finish("readRecordById", result)
    }

    async fn try_read_record_by_id(&self, id: &str) -> Result<ResponseEnvelope, ServiceError> {
        let id = require_id(id)?;
        let filter = RecordFilter::new().eq("id", id).eq("isActive", "true");
        let outcome = self
            .controller
            .read_records(&filter, &Projection::All, None, false, 0, 1)
            .await?;
        let found = match outcome {
            ReadOutcome::Documents(docs) => docs.into_iter().next().map(redact),
            ReadOutcome::Count(_) => None,
        };
        Ok(self.normalizer.process_single_read(found))
    }

    pub async fn read_records_by_filter(&self, options: QueryOptions) -> ResponseEnvelope {
        let result = self.try_read_records_by_filter(options).await;
        self.finish("readRecordsByFilter", result)
    }

    async fn try_read_records_by_filter(&self, options: QueryOptions) -> Result<ResponseEnvelope, ServiceError> {
        if options.is_empty() {
            return Err(ServiceError::validation("Query is required to filter."));
        }
        let outcome = self
            .normalizer
            .handle_database_read(self.controller.as_ref(), &options, RecordFilter::new())
            .await?;
        Ok(self.normalizer.process_multiple_read_results(Some(redact_outcome(outcome))))
    }

    /// Case-insensitive keyword search over the comma-separated `keys`, narrowed by `options`.
    pub async fn read_records_by_wildcard(&self, keys: &str, keyword: &str, options: QueryOptions) -> ResponseEnvelope {
        let result = self.try_read_records_by_wildcard(keys, keyword, options).await;
        self.finish("readRecordsByWildcard", result)
    }

    async fn try_read_records_by_wildcard(
        &self,
        keys: &str,
        keyword: &str,
        options: QueryOptions,
    ) -> Result<ResponseEnvelope, ServiceError> {
        let wildcard = build_wildcard_options(keys, keyword)?;
        let extra = RecordFilter::new().matching_any(&wildcard);
        let outcome = self
            .normalizer
            .handle_database_read(self.controller.as_ref(), &options, extra)
            .await?;
        Ok(self.normalizer.process_multiple_read_results(Some(redact_outcome(outcome))))
    }

    pub async fn update_record_by_id(&self, id: &str, body: Value) -> ResponseEnvelope {
        let result = self.try_update_record_by_id(id, body).await;
        self.finish("updateRecordById", result)
    }

    async fn try_update_record_by_id(&self, id: &str, body: Value) -> Result<ResponseEnvelope, ServiceError> {
        let id = require_id(id)?;
        let Some(data) = non_empty_object(Some(&body)).cloned() else {
            return Err(ServiceError::validation("Update requires data."));
        };
        RequestValidator::validate(&data, &self.update_schema)?;
        let ack = self.controller.update_records(&RecordFilter::new().eq("id", id), data).await?;
        Ok(self.normalizer.process_update_result(Some(ack), Some(UPDATED_EVENT)))
    }

    /// Bulk update. Body: `{ "options": {filters...}, "data": {fields...} }`.
    pub async fn update_records(&self, body: Value) -> ResponseEnvelope {
        let result = self.try_update_records(body).await;
        self.finish("updateRecords", result)
    }

    async fn try_update_records(&self, body: Value) -> Result<ResponseEnvelope, ServiceError> {
        let (Some(options), Some(data)) = (
            body.get("options").and_then(Value::as_object),
            body.get("data").and_then(Value::as_object),
        ) else {
            return Err(ServiceError::validation("Invalid options/data"));
        };
        if options.is_empty() {
            return Err(ServiceError::validation("Options are required to update"));
        }
        if data.is_empty() {
            return Err(ServiceError::validation("Data is required to update"));
        }
        let filter = self.bulk_filter(options, "Options are required to update")?;
        RequestValidator::validate_partial(data, &self.create_schema)?;
        let mut data = data.clone();
        data.remove("confirmPassword");
        let ack = self.controller.update_records(&filter, data).await?;
        Ok(self.normalizer.process_update_result(Some(ack), Some(UPDATED_EVENT)))
    }

    pub async fn delete_record_by_id(&self, id: &str) -> ResponseEnvelope {
        let result = self.try_delete_record_by_id(id).await;
        self.finish("deleteRecordById", result)
    }

    async fn try_delete_record_by_id(&self, id: &str) -> Result<ResponseEnvelope, ServiceError> {
        let id = require_id(id)?;
        let ack = self.controller.delete_records(&RecordFilter::new().eq("id", id)).await?;
        Ok(self.normalizer.process_delete_result(Some(ack)))
    }

    /// Bulk soft delete. Body: `{ "options": {filters...} }`.
    pub async fn delete_records(&self, body: Value) -> ResponseEnvelope {
        let result = self.try_delete_records(body).await;
        self.finish("deleteRecords", result)
    }

    async fn try_delete_records(&self, body: Value) -> Result<ResponseEnvelope, ServiceError> {
        let Some(options) = non_empty_object(body.get("options")) else {
            return Err(ServiceError::validation("Options are required"));
        };
        let filter = self.bulk_filter(options, "Options are required")?;
        let ack = self.controller.delete_records(&filter).await?;
        Ok(self.normalizer.process_delete_result(Some(ack)))
    }

    /// Filter conditions of a bulk write. Options holding only control keys would touch
    /// every live document and are rejected.
    fn bulk_filter(&self, options: &Document, message: &str) -> Result<RecordFilter, ServiceError> {
        let descriptor = build_query(&QueryOptions::from_json_object(options), self.normalizer.policy().limits)?;
        if descriptor.seek_conditions.is_empty() {
            return Err(ServiceError::validation(message));
        }
        Ok(RecordFilter::from_conditions(descriptor.seek_conditions))
    }
}
