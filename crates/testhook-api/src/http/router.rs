//! Axum router configuration with middleware.
//!
//! - `/{test_path_prefix}/{*path}` -- test webhook calls (no CORS layer; the
//!   handler answers preflight from the armed registrations)
//! - `/api/v1/...` -- management API and push WebSocket, permissive CORS
//! - `/health`

use axum::routing::{any, delete, get};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/test-webhooks",
            get(handlers::test_webhook::list_test_webhooks)
                .post(handlers::test_webhook::arm_test_webhook),
        )
        .route(
            "/test-webhooks/{workflow_id}",
            delete(handlers::test_webhook::cancel_test_webhook),
        )
        .route("/push/{session_id}", get(handlers::ws::push_ws_handler))
        .layer(cors);

    let prefix = state.config.server.test_path_prefix.trim_matches('/').to_string();

    Router::new()
        .nest("/api/v1", api_routes)
        .route(
            &format!("/{prefix}/{{*path}}"),
            any(handlers::webhook::receive_test_webhook),
        )
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use testhook_types::config::GlobalConfig;
    use testhook_types::error::NOT_REGISTERED_HINT;

    fn state() -> AppState {
        AppState::new(GlobalConfig::default())
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn workflow(id: Option<Uuid>, method: &str, path: &str) -> Value {
        json!({
            "id": id,
            "name": "orders",
            "nodes": [{
                "name": "Webhook",
                "type": "webhook",
                "parameters": { "httpMethod": method, "path": path },
            }],
        })
    }

    async fn arm(state: &AppState, workflow: Value) -> (StatusCode, Value) {
        send(
            state,
            json_request(
                Method::POST,
                "/api/v1/test-webhooks",
                json!({ "workflow": workflow, "session_id": "s1" }),
            ),
        )
        .await
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let state = state();
        let (status, body) = send(
            &state,
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn armed_webhook_fires_once() {
        let state = state();
        let (status, body) = arm(&state, workflow(Some(Uuid::now_v7()), "POST", "orders")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["waiting_for_webhook"], true);
        assert_eq!(body["data"]["expires_in_secs"], 120);
        assert!(body["_links"]["cancel"].is_string());

        let (status, body) = send(
            &state,
            json_request(Method::POST, "/webhook-test/orders", json!({ "id": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Workflow was started");
        assert!(body["executionId"].is_string());

        let (status, body) = send(
            &state,
            json_request(Method::POST, "/webhook-test/orders", json!({ "id": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errorCode"], "WEBHOOK_NOT_REGISTERED");
        assert_eq!(body["httpStatus"], 404);
        assert_eq!(body["hint"], NOT_REGISTERED_HINT);
    }

    #[tokio::test]
    async fn workflow_without_webhooks_does_not_wait() {
        let state = state();
        let (status, body) = arm(
            &state,
            json!({ "id": Uuid::now_v7(), "name": "manual", "nodes": [] }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["waiting_for_webhook"], false);
    }

    #[tokio::test]
    async fn unsaved_workflow_is_rejected() {
        let state = state();
        let (status, body) = arm(&state, workflow(None, "GET", "draft")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["errorCode"], "WORKFLOW_NOT_SAVED");
        assert!(body.get("hint").is_none());
    }

    #[tokio::test]
    async fn path_held_by_other_workflow_conflicts() {
        let state = state();
        let (status, _) = arm(&state, workflow(Some(Uuid::now_v7()), "GET", "shared")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = arm(&state, workflow(Some(Uuid::now_v7()), "GET", "shared")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["errorCode"], "WEBHOOK_REGISTRATION_FAILED");
    }

    #[tokio::test]
    async fn list_and_cancel() {
        let state = state();
        let id = Uuid::now_v7();
        arm(&state, workflow(Some(id), "GET", "orders")).await;

        let (status, body) = send(
            &state,
            Request::get("/api/v1/test-webhooks").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["workflow_id"], id.to_string());
        assert_eq!(body["data"][0]["keys"].as_array().unwrap().len(), 1);

        let uri = format!("/api/v1/test-webhooks/{id}");
        let (status, body) = send(
            &state,
            Request::delete(uri.as_str()).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["canceled"], true);

        let (_, body) = send(
            &state,
            Request::delete(uri.as_str()).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(body["data"]["canceled"], false);

        let (status, _) = send(
            &state,
            Request::get("/webhook-test/orders").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_with_invalid_id_is_validation_error() {
        let state = state();
        let (status, body) = send(
            &state,
            Request::delete("/api/v1/test-webhooks/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn dynamic_webhook_is_reachable_through_its_id() {
        let state = state();
        let workflow = json!({
            "id": Uuid::now_v7(),
            "name": "users",
            "nodes": [{
                "name": "Webhook",
                "type": "webhook",
                "webhook_id": "abc123",
                "parameters": { "httpMethod": "GET", "path": "users/:id" },
            }],
        });
        arm(&state, workflow).await;

        let (status, _) = send(
            &state,
            Request::get("/webhook-test/abc123/users/42").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let records = state.test_webhooks.executor().len();
        assert_eq!(records, 1);
    }

    #[tokio::test]
    async fn head_probe_keeps_webhook_armed() {
        let state = state();
        arm(&state, workflow(Some(Uuid::now_v7()), "HEAD", "probe")).await;

        let (status, _) = send(
            &state,
            Request::head("/webhook-test/probe").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.test_webhooks.store().len().await, 1);
    }

    #[tokio::test]
    async fn preflight_lists_methods_and_origin() {
        let state = state();
        let workflow = json!({
            "id": Uuid::now_v7(),
            "name": "cors",
            "nodes": [
                {
                    "name": "Post",
                    "type": "webhook",
                    "parameters": {
                        "httpMethod": "POST",
                        "path": "cors",
                        "options": { "allowedOrigins": "https://app.example.com" },
                    },
                },
                {
                    "name": "Get",
                    "type": "webhook",
                    "parameters": { "httpMethod": "GET", "path": "cors" },
                },
            ],
        });
        arm(&state, workflow).await;

        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/webhook-test/cors")
                    .header(header::ORIGIN, "https://app.example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, OPTIONS"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );

        // Preflight does not consume the registration.
        assert_eq!(state.test_webhooks.store().len().await, 2);

        let (status, body) = send(
            &state,
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/webhook-test/unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errorCode"], "WEBHOOK_NOT_REGISTERED");
    }

    #[tokio::test]
    async fn shutdown_removes_all_registrations() {
        let state = state();
        arm(&state, workflow(Some(Uuid::now_v7()), "GET", "one")).await;
        arm(&state, workflow(Some(Uuid::now_v7()), "GET", "two")).await;

        state.test_webhooks.remove_all().await;
        assert!(state.test_webhooks.store().is_empty().await);
        assert!(state.test_webhooks.routes().is_empty());
    }
}
