use std::sync::Arc;

use agentcomm_types::{
    JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse, RpcErrorCode, Task,
    METHOD_PUSH_NOTIFICATION,
};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use crate::error::WebhookError;
use crate::registry::CallbackRegistry;

/// Custom single-value token header; takes precedence over `Authorization`.
pub const WEBHOOK_TOKEN_HEADER: &str = "X-Webhook-Token";

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CallbackRegistry>,
}

/// Create an axum `Router` with the push-notification endpoints.
pub fn create_router(registry: Arc<CallbackRegistry>) -> Router {
    let state = AppState { registry };
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/webhook/{task_id}", post(handle_task_webhook))
        .with_state(state)
}

/// Bind `addr` and serve push notifications until shutdown.
///
/// Started once at process setup; the listener shares the caller's runtime.
pub async fn serve(addr: &str, registry: Arc<CallbackRegistry>) -> Result<(), WebhookError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr, "webhook listener started");
    axum::serve(listener, create_router(registry))
        .await
        .map_err(WebhookError::Io)?;
    Ok(())
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    process_notification(&state, None, &headers, &body)
}

async fn handle_task_webhook(
    Path(task_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    process_notification(&state, Some(task_id), &headers, &body)
}

/// Reject with an HTTP status and a JSON-RPC error envelope echoing `id`.
fn reject(status: StatusCode, id: JsonRpcId, code: RpcErrorCode, reason: &str) -> Response {
    let error = JsonRpcError::new(code, reason);
    (status, Json(JsonRpcResponse::error(id, error))).into_response()
}

fn process_notification(
    state: &AppState,
    path_task_id: Option<String>,
    headers: &HeaderMap,
    body: &str,
) -> Response {
    // Parse the envelope. An unparseable body has no id to echo.
    let request: JsonRpcRequest = match serde_json::from_str(body) {
        Ok(req) => req,
        Err(e) => {
            return reject(
                StatusCode::BAD_REQUEST,
                JsonRpcId::Null,
                RpcErrorCode::ParseError,
                &format!("Invalid JSON-RPC request: {e}"),
            );
        }
    };
    let request_id = request.id.clone();

    if request.jsonrpc != "2.0" {
        return reject(
            StatusCode::BAD_REQUEST,
            request_id,
            RpcErrorCode::InvalidRequest,
            "Invalid JSON-RPC request",
        );
    }
    if request.method != METHOD_PUSH_NOTIFICATION {
        return reject(
            StatusCode::BAD_REQUEST,
            request_id,
            RpcErrorCode::MethodNotFound,
            "Invalid method",
        );
    }

    let task_value = request
        .params
        .as_ref()
        .and_then(|params| params.get("task"))
        .cloned();
    let Some(task_value) = task_value else {
        return reject(
            StatusCode::BAD_REQUEST,
            request_id,
            RpcErrorCode::InvalidParams,
            "Invalid params",
        );
    };

    let payload_task_id = task_value
        .get("id")
        .and_then(|id| id.as_str())
        .map(str::to_string);
    // The path id wins for correlation; the generic route falls back to the
    // id inside the payload.
    let task_id = match path_task_id.or(payload_task_id) {
        Some(id) => id,
        None => {
            return reject(
                StatusCode::BAD_REQUEST,
                request_id,
                RpcErrorCode::InvalidParams,
                "Missing task ID",
            );
        }
    };

    if let Err(response) = authenticate(state, &task_id, headers, request_id.clone()) {
        return response;
    }

    let task: Task = match serde_json::from_value(task_value) {
        Ok(task) => task,
        Err(e) => {
            return reject(
                StatusCode::BAD_REQUEST,
                request_id,
                RpcErrorCode::InvalidParams,
                &format!("Invalid task payload: {e}"),
            );
        }
    };

    tracing::debug!(%task_id, state = %task.status.state, "push notification received");
    state.registry.dispatch(&task_id, &task);

    Json(JsonRpcResponse::success(
        request_id,
        serde_json::json!({"acknowledged": true}),
    ))
    .into_response()
}

/// Verify the shared secret for `task_id`, when one is registered.
///
/// The custom token header is checked first; a bearer `Authorization`
/// header is the fallback. No registered token means authentication is the
/// caller's choice and is skipped here.
fn authenticate(
    state: &AppState,
    task_id: &str,
    headers: &HeaderMap,
    request_id: JsonRpcId,
) -> Result<(), Response> {
    let Some(expected) = state.registry.token(task_id) else {
        return Ok(());
    };

    let unauthorized = |reason: &str| {
        Err(reject(
            StatusCode::UNAUTHORIZED,
            request_id.clone(),
            RpcErrorCode::Unauthorized,
            reason,
        ))
    };

    if let Some(value) = headers.get(WEBHOOK_TOKEN_HEADER) {
        return match value.to_str() {
            Ok(token) if token == expected => Ok(()),
            _ => unauthorized("Invalid token"),
        };
    }

    match headers.get(axum::http::header::AUTHORIZATION) {
        Some(value) => {
            let value = value.to_str().unwrap_or_default();
            match value.split_once(' ') {
                Some((scheme, token))
                    if scheme.eq_ignore_ascii_case("bearer") && token == expected =>
                {
                    Ok(())
                }
                Some((scheme, _)) if scheme.eq_ignore_ascii_case("bearer") => {
                    unauthorized("Invalid token")
                }
                _ => unauthorized("Invalid authorization header format"),
            }
        }
        None => unauthorized("Missing authorization header"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcomm_types::TaskState;
    use tokio::sync::mpsc;

    fn push_body(task_id: &str, state: &str) -> String {
        serde_json::json!({
            "jsonrpc": "2.0",
            "method": "pushNotifications/send",
            "params": {
                "task": {
                    "id": task_id,
                    "status": {"state": state}
                }
            },
            "id": "req-1"
        })
        .to_string()
    }

    fn app_state() -> AppState {
        AppState {
            registry: Arc::new(CallbackRegistry::new()),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        // Pull the buffered body back out of the response.
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_valid_notification_acknowledged() {
        let state = app_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.registry.register("t-1", tx, None);

        let response =
            process_notification(&state, None, &HeaderMap::new(), &push_body("t-1", "working"));
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["result"]["acknowledged"], true);
        assert_eq!(json["id"], "req-1");

        let task = rx.recv().await.unwrap();
        assert_eq!(task.id, "t-1");
        assert_eq!(task.status.state, TaskState::Working);
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        let state = app_state();
        let response = process_notification(&state, None, &HeaderMap::new(), "{not json");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], -32700);
        assert_eq!(json["id"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_wrong_method_rejected() {
        let state = app_state();
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "tasks/get",
            "params": {"task": {"id": "t-1"}},
            "id": 7
        })
        .to_string();
        let response = process_notification(&state, None, &HeaderMap::new(), &body);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "Invalid method");
        assert_eq!(json["id"], 7);
    }

    #[tokio::test]
    async fn test_missing_task_rejected() {
        let state = app_state();
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "pushNotifications/send",
            "params": {},
            "id": 7
        })
        .to_string();
        let response = process_notification(&state, None, &HeaderMap::new(), &body);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_task_id_rejected_on_generic_route() {
        let state = app_state();
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "pushNotifications/send",
            "params": {"task": {"status": {"state": "working"}}},
            "id": 7
        })
        .to_string();
        let response = process_notification(&state, None, &HeaderMap::new(), &body);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "Missing task ID");
    }

    #[tokio::test]
    async fn test_custom_token_header_accepted_without_authorization() {
        let state = app_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.registry.register("t-1", tx, Some("secret".into()));

        let mut headers = HeaderMap::new();
        headers.insert(WEBHOOK_TOKEN_HEADER, "secret".parse().unwrap());
        let response =
            process_notification(&state, None, &headers, &push_body("t-1", "completed"));
        assert_eq!(response.status(), StatusCode::OK);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_custom_token_header_takes_precedence() {
        let state = app_state();
        let (tx, _rx) = mpsc::unbounded_channel();
        state.registry.register("t-1", tx, Some("secret".into()));

        // Valid bearer token, but the custom header is wrong: rejected.
        let mut headers = HeaderMap::new();
        headers.insert(WEBHOOK_TOKEN_HEADER, "wrong".parse().unwrap());
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer secret".parse().unwrap(),
        );
        let response = process_notification(&state, None, &headers, &push_body("t-1", "working"));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_mismatched_bearer_rejected() {
        let state = app_state();
        let (tx, _rx) = mpsc::unbounded_channel();
        state.registry.register("t-1", tx, Some("secret".into()));

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer wrong".parse().unwrap(),
        );
        let response = process_notification(&state, None, &headers, &push_body("t-1", "working"));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Registration survives the rejection.
        assert_eq!(state.registry.token("t-1").as_deref(), Some("secret"));
        assert!(state.registry.has_callbacks("t-1"));
    }

    #[tokio::test]
    async fn test_missing_auth_rejected_when_token_registered() {
        let state = app_state();
        let (tx, _rx) = mpsc::unbounded_channel();
        state.registry.register("t-1", tx, Some("secret".into()));

        let response =
            process_notification(&state, None, &HeaderMap::new(), &push_body("t-1", "working"));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_no_token_registered_skips_auth() {
        let state = app_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.registry.register("t-1", tx, None);

        let response =
            process_notification(&state, None, &HeaderMap::new(), &push_body("t-1", "working"));
        assert_eq!(response.status(), StatusCode::OK);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_path_task_id_overrides_payload() {
        let state = app_state();
        let (tx, mut rx) = mpsc::unbounded_channel();
        // Registered under the correlation id used in the URL path, not the
        // server-assigned task id in the payload.
        state.registry.register("corr-1", tx, None);

        let response = process_notification(
            &state,
            Some("corr-1".into()),
            &HeaderMap::new(),
            &push_body("t-server-9", "completed"),
        );
        assert_eq!(response.status(), StatusCode::OK);
        let task = rx.recv().await.unwrap();
        assert_eq!(task.id, "t-server-9");
    }

    #[tokio::test]
    async fn test_bad_authorization_format_rejected() {
        let state = app_state();
        let (tx, _rx) = mpsc::unbounded_channel();
        state.registry.register("t-1", tx, Some("secret".into()));

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "secret".parse().unwrap(),
        );
        let response = process_notification(&state, None, &headers, &push_body("t-1", "working"));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
