//! Test-webhook receiver.
//!
//! Every method on `/{prefix}/{*path}` lands here. `OPTIONS` answers a CORS
//! preflight from the armed registrations; anything else is dispatched to the
//! registry, which runs the workflow at most once and disarms it.

use std::collections::HashMap;

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use testhook_types::error::WebhookError;
use testhook_types::webhook::{HttpMethod, WebhookRequest, WebhookResponse};

use crate::http::error::AppError;
use crate::state::AppState;

/// ANY /{prefix}/{*path} - Receive a call to an armed test webhook.
pub async fn receive_test_webhook(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let origin = header_str(&headers, header::ORIGIN);

    if method == Method::OPTIONS {
        return preflight(&state, &path, &headers, origin).await;
    }

    let method: HttpMethod = method
        .as_str()
        .parse()
        .map_err(|_| WebhookError::path_not_registered(&path))?;

    let cors = match origin {
        Some(_) => state
            .test_webhooks
            .access_control_options(method, &path)
            .await,
        None => None,
    };

    let mut request = WebhookRequest::new(method, path.clone()).with_body(parse_body(&body));
    request.query = query;
    request.headers = headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();

    tracing::debug!(%method, %path, "test webhook call received");
    let outcome = state.test_webhooks.dispatch(request).await?;

    let mut response = into_http_response(outcome.response());
    if let Some(allow) = origin.and_then(|o| allowed_origin(cors.as_deref(), o)) {
        insert_header(&mut response, header::ACCESS_CONTROL_ALLOW_ORIGIN, &allow);
    }
    Ok(response)
}

async fn preflight(
    state: &AppState,
    path: &str,
    headers: &HeaderMap,
    origin: Option<&str>,
) -> Result<Response, AppError> {
    let methods = state.test_webhooks.methods_for(path).await?;

    let requested = header_str(headers, header::ACCESS_CONTROL_REQUEST_METHOD)
        .and_then(|m| m.parse::<HttpMethod>().ok());
    let allowed_origins = match requested {
        Some(m) => state.test_webhooks.access_control_options(m, path).await,
        None => None,
    };

    let mut allow_methods: Vec<&str> = methods.iter().map(HttpMethod::as_str).collect();
    if !methods.contains(&HttpMethod::Options) {
        allow_methods.push(HttpMethod::Options.as_str());
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    insert_header(
        &mut response,
        header::ACCESS_CONTROL_ALLOW_METHODS,
        &allow_methods.join(", "),
    );
    if let Some(requested_headers) = header_str(headers, header::ACCESS_CONTROL_REQUEST_HEADERS) {
        insert_header(&mut response, header::ACCESS_CONTROL_ALLOW_HEADERS, requested_headers);
    }
    if let Some(allow) = origin.and_then(|o| allowed_origin(allowed_origins.as_deref(), o)) {
        insert_header(&mut response, header::ACCESS_CONTROL_ALLOW_ORIGIN, &allow);
    }
    Ok(response)
}

/// Value for `Access-Control-Allow-Origin` given a webhook's allowed-origins
/// setting (comma-separated, `*` or unset for any) and the caller's origin.
pub fn allowed_origin(setting: Option<&str>, origin: &str) -> Option<String> {
    match setting.map(str::trim) {
        None | Some("") | Some("*") => Some("*".to_string()),
        Some(list) => list
            .split(',')
            .map(str::trim)
            .any(|allowed| allowed == origin)
            .then(|| origin.to_string()),
    }
}

/// Best-effort body decoding: JSON if it parses, otherwise the raw text.
fn parse_body(body: &Bytes) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn into_http_response(webhook: &WebhookResponse) -> Response {
    let status = StatusCode::from_u16(webhook.status).unwrap_or(StatusCode::OK);
    let mut response = if webhook.body.is_null() {
        Response::new(Body::empty())
    } else {
        let mut response = Response::new(Body::from(webhook.body.to_string()));
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    };
    *response.status_mut() = status;

    for (name, value) in &webhook.headers {
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => tracing::warn!(header = %name, "dropping invalid response header"),
        }
    }
    response
}

fn insert_header(response: &mut Response, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response.headers_mut().insert(name, value);
    }
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
