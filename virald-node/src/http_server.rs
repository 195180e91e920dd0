//! HTTP REST API.
//!
//! Exposes the manager's lifecycle operations under `/api/v1`. Request and
//! response bodies mirror `VmConfig` / `VmInfo` field for field (camelCase).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use virald_provider::{ErrorKind, ProviderError, VmConfig, VmInfo, VmManager};

/// Shared state for HTTP handlers
pub struct AppState {
    pub manager: Arc<VmManager>,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl ApiError {
    fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// Map a provider error to an HTTP status and error body.
fn api_error(e: ProviderError) -> (StatusCode, Json<ApiError>) {
    let (status, code) = match e.kind() {
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        ErrorKind::BackendUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable"),
        ErrorKind::CreationFailed => (StatusCode::BAD_GATEWAY, "creation_failed"),
        ErrorKind::ExternalToolFailure => (StatusCode::BAD_GATEWAY, "external_tool_failure"),
    };

    if status.is_server_error() {
        error!(error = %e, "Request failed");
    }

    (status, Json(ApiError::new(code, &e.to_string())))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersResponse {
    pub available: Vec<String>,
    pub active: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetProviderRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmStatusResponse {
    pub id: String,
    pub status: String,
}

// ============================================================================
// Server
// ============================================================================

/// Start the HTTP API server and run until `shutdown` resolves.
pub async fn run_http_server<F>(
    addr: SocketAddr,
    manager: Arc<VmManager>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = build_app_router(Arc::new(AppState { manager }));

    info!(address = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Build the application router with all routes
pub fn build_app_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/providers", get(list_providers))
        .route("/providers/active", put(set_active_provider))
        .route("/vms", get(list_vms).post(create_vm))
        .route("/vms/:vm_id", get(get_vm).delete(delete_vm))
        .route("/vms/:vm_id/stop", post(stop_vm))
        .route("/vms/:vm_id/status", get(get_vm_status));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/v1/providers
async fn list_providers(State(state): State<Arc<AppState>>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        available: state.manager.available_providers(),
        active: state.manager.active_provider(),
    })
}

/// PUT /api/v1/providers/active
async fn set_active_provider(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetProviderRequest>,
) -> ApiResult<Json<ProvidersResponse>> {
    state.manager.set_provider(&request.name).map_err(api_error)?;

    Ok(Json(ProvidersResponse {
        available: state.manager.available_providers(),
        active: state.manager.active_provider(),
    }))
}

/// GET /api/v1/vms
async fn list_vms(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<VmInfo>>> {
    state.manager.list_vms().map(Json).map_err(api_error)
}

/// POST /api/v1/vms
async fn create_vm(
    State(state): State<Arc<AppState>>,
    Json(config): Json<VmConfig>,
) -> ApiResult<(StatusCode, Json<VmInfo>)> {
    let vm = state.manager.create_vm(config).await.map_err(api_error)?;
    info!(vm_id = %vm.id, port = vm.port, "VM created via HTTP API");
    Ok((StatusCode::CREATED, Json(vm)))
}

/// GET /api/v1/vms/:vm_id
async fn get_vm(
    State(state): State<Arc<AppState>>,
    Path(vm_id): Path<String>,
) -> ApiResult<Json<VmInfo>> {
    match state.manager.get_vm(&vm_id).map_err(api_error)? {
        Some(vm) => Ok(Json(vm)),
        None => Err(api_error(ProviderError::VmNotFound(vm_id))),
    }
}

/// DELETE /api/v1/vms/:vm_id
async fn delete_vm(
    State(state): State<Arc<AppState>>,
    Path(vm_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.manager.delete_vm(&vm_id).await.map_err(api_error)?;
    info!(vm_id = %vm_id, "VM deleted via HTTP API");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/vms/:vm_id/stop
async fn stop_vm(
    State(state): State<Arc<AppState>>,
    Path(vm_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.manager.stop_vm(&vm_id).await.map_err(api_error)?;
    info!(vm_id = %vm_id, "VM stopped via HTTP API");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/vms/:vm_id/status
async fn get_vm_status(
    State(state): State<Arc<AppState>>,
    Path(vm_id): Path<String>,
) -> ApiResult<Json<VmStatusResponse>> {
    let status = state.manager.get_vm_status(&vm_id).await.map_err(api_error)?;
    if status == virald_provider::STATUS_UNKNOWN {
        warn!(vm_id = %vm_id, "VM status unknown");
    }
    Ok(Json(VmStatusResponse { id: vm_id, status }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;
    use virald_provider::{
        CommandOutput, CommandRunner, DockerProvider, ProviderKind, VmProvider,
    };

    /// Every docker invocation succeeds and reports a running container.
    struct RunningDocker;

    #[async_trait]
    impl CommandRunner for RunningDocker {
        async fn run(&self, _program: &str, _args: &[String]) -> virald_provider::Result<CommandOutput> {
            Ok(CommandOutput {
                status_code: Some(0),
                stdout: "running\n".to_string(),
                stderr: String::new(),
            })
        }
    }

    async fn app(with_docker: bool) -> (Router, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let mut candidates: Vec<(ProviderKind, Arc<dyn VmProvider>)> = Vec::new();
        if with_docker {
            let docker = DockerProvider::with_runner(dir.path(), 8006, Arc::new(RunningDocker));
            candidates.push((ProviderKind::Docker, Arc::new(docker) as Arc<dyn VmProvider>));
        }
        let manager = Arc::new(VmManager::discover(candidates).await);
        (build_app_router(Arc::new(AppState { manager })), dir)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_vm_round_trip() {
        let (app, _dir) = app(true).await;

        let (status, vm) = send(
            &app,
            "POST",
            "/api/v1/vms",
            Some(serde_json::json!({ "isoUrl": "https://example/image.iso", "name": "web" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(vm["name"], "web");
        assert_eq!(vm["port"], 8006);
        assert_eq!(vm["connectionUrl"], "http://localhost:8006");
        let id = vm["id"].as_str().unwrap().to_string();

        let (status, fetched) = send(&app, "GET", &format!("/api/v1/vms/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["config"]["isoUrl"], "https://example/image.iso");

        let (status, body) = send(&app, "GET", &format!("/api/v1/vms/{}/status", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");

        let (status, _) = send(&app, "POST", &format!("/api/v1/vms/{}/stop", id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, "DELETE", &format!("/api/v1/vms/{}", id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, list) = send(&app, "GET", "/api/v1/vms", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list, serde_json::json!([]));

        let (status, body) = send(&app, "DELETE", &format!("/api/v1/vms/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_unknown_vm_is_404() {
        let (app, _dir) = app(true).await;
        let (status, _) = send(&app, "GET", "/api/v1/vms/vm-missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "POST", "/api/v1/vms/vm-missing/stop", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_no_provider_is_503() {
        let (app, _dir) = app(false).await;
        let (status, body) = send(&app, "GET", "/api/v1/vms", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "backend_unavailable");
    }

    #[tokio::test]
    async fn test_providers() {
        let (app, _dir) = app(true).await;

        let (status, body) = send(&app, "GET", "/api/v1/providers", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "available": ["docker"], "active": "docker" }));

        let (status, _) = send(
            &app,
            "PUT",
            "/api/v1/providers/active",
            Some(serde_json::json!({ "name": "utm" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_requires_iso_url() {
        let (app, _dir) = app(true).await;
        let (status, _) = send(&app, "POST", "/api/v1/vms", Some(serde_json::json!({ "name": "x" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
