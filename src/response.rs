//! Uniform response envelope returned by every service operation.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Exactly one of payload/error is carried; `status` always drives the HTTP status.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseEnvelope {
    Success {
        payload: Value,
        status: StatusCode,
        response_type: String,
        /// Write the payload as-is with `response_type` instead of a JSON envelope.
        send_raw_response: bool,
    },
    Failure {
        error: String,
        status: StatusCode,
    },
}

impl ResponseEnvelope {
    pub fn success(payload: Value) -> Self {
        Self::success_with_status(payload, StatusCode::OK)
    }

    pub fn success_with_status(payload: Value, status: StatusCode) -> Self {
        ResponseEnvelope::Success {
            payload,
            status,
            response_type: JSON_CONTENT_TYPE.to_string(),
            send_raw_response: false,
        }
    }

    pub fn raw(body: impl Into<String>, response_type: &str) -> Self {
        ResponseEnvelope::Success {
            payload: Value::String(body.into()),
            status: StatusCode::OK,
            response_type: response_type.to_string(),
            send_raw_response: true,
        }
    }

    pub fn failure(error: impl Into<String>, status: StatusCode) -> Self {
        ResponseEnvelope::Failure {
            error: error.into(),
            status,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ResponseEnvelope::Success { status, .. } | ResponseEnvelope::Failure { status, .. } => *status,
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            ResponseEnvelope::Success { payload, .. } => Some(payload),
            ResponseEnvelope::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ResponseEnvelope::Success { .. } => None,
            ResponseEnvelope::Failure { error, .. } => Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Success { .. })
    }
}

#[derive(Serialize)]
struct SuccessBody<'a> {
    status: u16,
    payload: &'a Value,
}

#[derive(Serialize)]
struct FailureBody<'a> {
    status: u16,
    error: &'a str,
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        match self {
            ResponseEnvelope::Success { status, .. } if status == StatusCode::NO_CONTENT => {
                status.into_response()
            }
            ResponseEnvelope::Success {
                payload,
                status,
                response_type,
                send_raw_response: true,
            } => {
                let body = match payload {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                let content_type = HeaderValue::from_str(&response_type)
                    .unwrap_or_else(|_| HeaderValue::from_static(JSON_CONTENT_TYPE));
                (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
            }
            ResponseEnvelope::Success { payload, status, .. } => (
                status,
                Json(SuccessBody {
                    status: status.as_u16(),
                    payload: &payload,
                }),
            )
                .into_response(),
            ResponseEnvelope::Failure { error, status } => (
                status,
                Json(FailureBody {
                    status: status.as_u16(),
                    error: &error,
                }),
            )
                .into_response(),
        }
    }
}
