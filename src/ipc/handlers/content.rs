use serde_json::{json, Value};
use tracing::debug;

use crate::api::Method;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{api, required_i64, required_str, respond};
use crate::ipc::types::{AppState, Request};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body {
    Empty,
    /// `params.data` is forwarded as the request body.
    Data,
    /// The body is assembled from named params.
    Fields,
}

/// How one lesson-content method maps onto the server. `{}` in `path` takes `params[id_key]`.
#[derive(Debug, Clone, Copy)]
struct Route {
    method: Method,
    path: &'static str,
    id_key: Option<&'static str>,
    body: Body,
    html: bool,
}

const fn route(method: Method, path: &'static str, id_key: Option<&'static str>, body: Body) -> Route {
    Route {
        method,
        path,
        id_key,
        body,
        html: false,
    }
}

fn lookup(name: &str) -> Option<Route> {
    use Body::*;
    use Method::*;
    let r = match name {
        "units.create" => route(Post, "/plan/{}/units", Some("planId"), Fields),
        "units.delete" => route(Delete, "/units/{}", Some("unitId"), Empty),
        "units.plan.get" => Route {
            html: true,
            ..route(Get, "/units/{}/plan", Some("unitId"), Empty)
        },
        "units.plan.save" => route(Post, "/units/{}/plan/save", Some("unitId"), Data),
        "units.log.save" => route(Post, "/log/unit/{}", Some("unitId"), Data),
        "units.selectedTopics" => route(Get, "/units/{}/selected-topics", Some("unitId"), Empty),
        "subUnits.create" => route(Post, "/units/{}/sub_units", Some("unitId"), Data),
        "subUnits.get" => route(Get, "/sub_units/{}", Some("subUnitId"), Empty),
        "subUnits.update" => route(Put, "/sub_units/{}", Some("subUnitId"), Data),
        "subUnits.delete" => route(Delete, "/sub_units/{}", Some("subUnitId"), Empty),
        "gradedItems.create" => route(Post, "/units/{}/graded-items", Some("unitId"), Data),
        "gradedItems.get" => route(Get, "/graded-items/{}", Some("itemId"), Empty),
        "gradedItems.update" => route(Put, "/graded-items/{}", Some("itemId"), Data),
        "gradedItems.delete" => route(Delete, "/graded-items/{}", Some("itemId"), Empty),
        "gradedItems.forSelection" => {
            route(Get, "/units/{}/graded-items-for-selection", Some("unitId"), Empty)
        }
        "assessmentItems.add" => route(Post, "/units/{}/assessment-items", Some("unitId"), Fields),
        "templates.topics" => {
            route(Get, "/templates/{}/topics-for-selection", Some("templateId"), Empty)
        }
        "indicators.addCustom" => route(Post, "/indicators/add-custom", None, Fields),
        _ => return None,
    };
    Some(r)
}

fn fields(name: &str, params: &Value) -> Result<Value, HandlerErr> {
    match name {
        "units.create" => Ok(json!({ "title": required_str(params, "title")? })),
        "assessmentItems.add" => {
            let template_id = required_i64(params, "templateId")?;
            let topic_ids = params
                .get("topicIds")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            Ok(json!({ "template_id": template_id, "topic_ids": topic_ids }))
        }
        "indicators.addCustom" => Ok(json!({
            "code": required_str(params, "code")?,
            "description": required_str(params, "description")?,
            "plan_id": required_i64(params, "planId")?,
        })),
        _ => Ok(Value::Null),
    }
}

fn forward(state: &mut AppState, req: &Request, r: Route) -> Result<Value, HandlerErr> {
    let path = match r.id_key {
        Some(key) => r.path.replace("{}", &required_i64(&req.params, key)?.to_string()),
        None => r.path.to_string(),
    };
    let body = match r.body {
        Body::Empty => None,
        Body::Data => Some(
            req.params
                .get("data")
                .cloned()
                .filter(|d| d.is_object())
                .ok_or_else(|| HandlerErr::bad_params("missing data"))?,
        ),
        Body::Fields => Some(fields(&req.method, &req.params)?),
    };
    let api = api(state)?;
    debug!(method = %req.method, path = %path, "forwarding content call");
    if r.html {
        return Ok(json!({ "html": api.text(&path)? }));
    }
    Ok(api.call(r.method, &path, &[], body.as_ref())?)
}

fn search_indicators(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let q = req
        .params
        .get("q")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or("");
    // Short queries match nearly everything; the picker waits for more input.
    if q.chars().count() < 2 {
        return Ok(json!([]));
    }
    Ok(api(state)?.search_indicators(q)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    if req.method == "indicators.search" {
        return Some(respond(&req.id, search_indicators(state, req)));
    }
    let r = lookup(&req.method)?;
    Some(respond(&req.id, forward(state, req, r)))
}
