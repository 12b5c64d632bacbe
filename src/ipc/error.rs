use serde_json::json;

use crate::api::ApiError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Server failure on a read; `message` is what the shell shows in place of the content.
    pub fn load_failed(message: &str, e: &ApiError) -> Self {
        Self::new("load_failed", message).with_details(json!({ "cause": e.user_message() }))
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<ApiError> for HandlerErr {
    fn from(e: ApiError) -> Self {
        match &e {
            ApiError::NotConfigured => HandlerErr::new("no_session", e.to_string()),
            ApiError::Status { status, .. } => HandlerErr::new("server_error", e.user_message())
                .with_details(json!({ "status": status })),
            _ => HandlerErr::new("server_error", e.user_message()),
        }
    }
}

impl From<anyhow::Error> for HandlerErr {
    fn from(e: anyhow::Error) -> Self {
        HandlerErr::new("db_query_failed", e.to_string())
    }
}
