use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::plans::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::gradebook::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::groups::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::workspace::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::mobile::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::content::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::saves::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
