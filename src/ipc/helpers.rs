use std::sync::Arc;

use serde_json::Value;
use tracing::error;

use super::error::{ok, HandlerErr};
use super::types::{AppState, GradebookSession};
use crate::api::ServerApi;
use crate::model::{value_to_f64, value_to_i64};

pub fn respond(id: &str, result: Result<Value, HandlerErr>) -> Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

/// Accepts numbers and numeric strings, as the shell sends ids either way.
pub fn required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(value_to_i64)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_i64(params: &Value, key: &str) -> Option<i64> {
    params.get(key).and_then(value_to_i64)
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Like `required_i64`, but for ids a save cannot go out without. Logged before the request is rejected.
pub fn save_id(params: &Value, key: &str, save: &str) -> Result<i64, HandlerErr> {
    required_i64(params, key).map_err(|e| {
        error!(save = save, field = key, "save aborted: missing identifier");
        e
    })
}

/// Empty input clears the cell; anything else must parse as a number.
pub fn score_input(v: Option<&Value>) -> Result<Option<f64>, HandlerErr> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(other) => value_to_f64(other)
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params("กรุณากรอกคะแนนเป็นตัวเลข")),
    }
}

pub fn api(state: &AppState) -> Result<Arc<ServerApi>, HandlerErr> {
    state
        .api
        .clone()
        .ok_or_else(|| HandlerErr::new("no_session", "no server configured; call session.configure"))
}

pub fn gradebook(state: &AppState) -> Result<&GradebookSession, HandlerErr> {
    state
        .gradebook
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_gradebook", "no gradebook open"))
}

pub fn gradebook_mut(state: &mut AppState) -> Result<&mut GradebookSession, HandlerErr> {
    state
        .gradebook
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_gradebook", "no gradebook open"))
}
