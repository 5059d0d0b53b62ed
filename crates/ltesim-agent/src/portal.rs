//! Local control portal: JSON API over the orchestrator and the device.
//!
//! Failures are returned as `{ "kind", "message" }` with a status code
//! derived from the error kind.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use ltesim_common::models::{
    CalibrationReport, DeviceInfo, DeviceSession, NetworkConfig, NetworkParams, TestOutcome,
};
use ltesim_common::{Error, ErrorKind, Failure};

use crate::device::DeviceController;
use crate::generator;
use crate::orchestrator::NetworkOrchestrator;

/// State shared by all handlers.
pub struct AppState {
    pub orchestrator: NetworkOrchestrator,
    pub device: tokio::sync::Mutex<DeviceController>,
}

impl AppState {
    pub fn new(orchestrator: NetworkOrchestrator, device: DeviceController) -> Arc<Self> {
        Arc::new(Self {
            orchestrator,
            device: tokio::sync::Mutex::new(device),
        })
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    failure: Failure,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            failure: Failure {
                kind: ErrorKind::InvalidParameter,
                message: message.into(),
            },
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err.kind() {
            ErrorKind::InvalidParameter => StatusCode::BAD_REQUEST,
            ErrorKind::AlreadyRunning => StatusCode::CONFLICT,
            ErrorKind::ConnectionError | ErrorKind::OrchestratorGone => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorKind::SpawnError | ErrorKind::VerificationFailure | ErrorKind::IoError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            failure: err.to_failure(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.failure)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// JSON body, or `T::default()` when the body is empty.
fn body_or_default<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route("/api/network/generate", post(network_generate))
        .route("/api/network/start", post(network_start))
        .route("/api/network/stop", post(network_stop))
        .route("/api/device/discover", get(device_discover))
        .route("/api/device/connect", post(device_connect))
        .route("/api/device/test", post(device_test))
        .route("/api/device/calibrate", post(device_calibrate))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(state);
    tracing::info!("control portal on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html><head><title>LTE Simulator</title></head>
<body>
<h1>LTE Simulator</h1>
<p>Control portal. <a href="/api/status">View status JSON</a></p>
</body></html>"#,
    )
}

async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let network = state.orchestrator.status();
    // A running test battery holds the device lock; report it as busy.
    let (device, busy) = match state.device.try_lock() {
        Ok(device) => (Some(device.session().clone()), false),
        Err(_) => (None, true),
    };
    Json(serde_json::json!({
        "network": network,
        "device": device,
        "device_busy": busy,
    }))
}

async fn network_generate(body: Bytes) -> ApiResult<NetworkConfig> {
    let params: NetworkParams = body_or_default(&body)?;
    Ok(Json(generator::generate(&params)?))
}

async fn network_start(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<NetworkConfig> {
    let params: NetworkParams = body_or_default(&body)?;
    Ok(Json(state.orchestrator.start(params).await?))
}

async fn network_stop(State(state): State<Arc<AppState>>) -> ApiResult<serde_json::Value> {
    state.orchestrator.stop().await?;
    Ok(Json(serde_json::json!({ "state": state.orchestrator.status().state })))
}

async fn device_discover(State(state): State<Arc<AppState>>) -> Json<Vec<DeviceInfo>> {
    let device = state.device.lock().await;
    Json(device.discover().await)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConnectRequest {
    device_args: Option<String>,
}

async fn device_connect(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<DeviceSession> {
    let req: ConnectRequest = body_or_default(&body)?;
    let mut device = state.device.lock().await;
    Ok(Json(device.connect(req.device_args.as_deref()).await?))
}

async fn device_test(State(state): State<Arc<AppState>>) -> ApiResult<TestOutcome> {
    let device = state.device.lock().await;
    Ok(Json(device.run_tests().await?))
}

async fn device_calibrate(State(state): State<Arc<AppState>>) -> ApiResult<CalibrationReport> {
    let device = state.device.lock().await;
    Ok(Json(device.calibrate().await?))
}
