use crate::api::ServerApi;
use crate::config::normalize_base_url;
use crate::db;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{optional_str, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const SERVER_URL_KEY: &str = "session.serverUrl";

fn session_info(state: &AppState) -> serde_json::Value {
    json!({
        "serverUrl": state.config.server_url,
        "hasCsrfToken": state.config.csrf_token.is_some(),
        "hasSessionCookie": state.config.session_cookie.is_some(),
        "configured": state.api.is_some(),
    })
}

fn rebuild_api(state: &mut AppState) -> Result<(), HandlerErr> {
    if state.config.server_url.is_none() {
        state.api = None;
        return Ok(());
    }
    let api = ServerApi::from_config(&state.config)?;
    state.api = Some(Arc::new(api));
    Ok(())
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "serverConfigured": state.api.is_some(),
            "pendingSaves": state.outbox.len(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            state.workspace = Some(path.clone());
            // A URL from the environment or session.configure takes precedence over the stored one.
            if state.config.server_url.is_none() {
                match db::settings_get_json(&conn, SERVER_URL_KEY) {
                    Ok(Some(v)) => {
                        if let Some(url) = v.as_str() {
                            state.config.server_url = Some(normalize_base_url(url));
                            if let Err(e) = rebuild_api(state) {
                                warn!(error = %e.message, "stored server url could not be used");
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "failed to read stored session settings"),
                }
            }
            state.db = Some(conn);
            info!(path = %path.display(), "workspace selected");
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "session": session_info(state),
                }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn session_configure(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let params = &req.params;
    if let Some(url) = optional_str(params, "serverUrl") {
        state.config.server_url = Some(normalize_base_url(&url));
    }
    if params.get("csrfToken").is_some() {
        state.config.csrf_token = optional_str(params, "csrfToken");
    }
    if params.get("sessionCookie").is_some() {
        state.config.session_cookie = optional_str(params, "sessionCookie");
    }
    rebuild_api(state)?;

    if let (Some(conn), Some(url)) = (state.db.as_ref(), state.config.server_url.as_ref()) {
        db::settings_set_json(conn, SERVER_URL_KEY, &json!(url))?;
    }
    info!(server = ?state.config.server_url, "session configured");
    Ok(session_info(state))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "session.configure" => Some(respond(&req.id, session_configure(state, req))),
        "session.get" => Some(ok(&req.id, session_info(state))),
        _ => None,
    }
}
