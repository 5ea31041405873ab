use axum::http::{HeaderMap, header};
use serde::Serialize;

use crate::validation::form::FieldErrors;

/// The JSON envelope every API endpoint answers with.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errors: None,
            data: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            errors: None,
            data: Some(data),
        }
    }

    pub fn with_errors(message: impl Into<String>, errors: FieldErrors) -> Self {
        Self {
            message: message.into(),
            errors: Some(errors),
            data: None,
        }
    }
}

/// Payload telling a programmatic client where to go next.
#[derive(Debug, Serialize)]
pub struct RedirectData {
    pub redirect_path: String,
}

/// Whether the caller negotiates JSON through `Accept` or `Content-Type`.
pub fn wants_json(headers: &HeaderMap) -> bool {
    [header::ACCEPT, header::CONTENT_TYPE].iter().any(|name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"))
    })
}
