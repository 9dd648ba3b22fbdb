use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::ControlCommand;
use crate::engine::ControlSnapshot;
use crate::engine::Engine;
use crate::engine::MessageError;
use crate::engine::RoomState;
use crate::engine::SensorReading;
use crate::engine::ThresholdUpdate;
use crate::engine::message;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
}

/// Acknowledgement for the dashboard update channels
#[derive(Serialize)]
struct SuccessResponse {
    status: &'static str,
}

/// Acknowledgement for a sensor update, carrying the actuator values to apply
#[derive(Serialize)]
struct SensorUpdateResponse {
    status: &'static str,
    #[serde(flatten)]
    control: ControlSnapshot,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
}

/// Errors surfaced to HTTP clients
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body could not be decoded; nothing was applied
    #[error(transparent)]
    Malformed(#[from] MessageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!("Rejecting request: {}", self);
        let status = match self {
            ApiError::Malformed(_) => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(ErrorResponse {
                status: "error",
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Shared application state
struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
        }),
    )
}

/// Handler for POST /esp/update
#[tracing::instrument(skip(state, body))]
async fn sensor_update(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SensorUpdateResponse>, ApiError> {
    let reading: SensorReading = message::decode(&body)?;
    let control = state.engine.apply_sensor_update(reading);
    Ok(Json(SensorUpdateResponse {
        status: "success",
        control,
    }))
}

/// Handler for GET /esp/control and GET /api/system_status
#[tracing::instrument(skip(state))]
async fn system_status(State(state): State<Arc<AppState>>) -> Json<RoomState> {
    Json(state.engine.state_snapshot())
}

/// Handler for GET /api/control
#[tracing::instrument(skip(state))]
async fn control_status(State(state): State<Arc<AppState>>) -> Json<ControlSnapshot> {
    Json(state.engine.control_snapshot())
}

/// Handler for POST /flet/update
#[tracing::instrument(skip(state, body))]
async fn control_update(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    let command: ControlCommand = message::decode(&body)?;
    state.engine.apply_control_update(command);
    Ok(Json(SuccessResponse { status: "success" }))
}

/// Handler for POST /flet/update_thresholds
#[tracing::instrument(skip(state, body))]
async fn threshold_update(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    let update: ThresholdUpdate = message::decode(&body)?;
    state.engine.apply_threshold_update(update);
    Ok(Json(SuccessResponse { status: "success" }))
}

/// Create the API router with all endpoints
///
/// Paths match what the sensor firmware (`/esp/*`) and the dashboards
/// (`/flet/*`, `/api/*`) already call.
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/esp/update", post(sensor_update))
        .route("/esp/control", get(system_status))
        .route("/flet/update", post(control_update))
        .route("/flet/update_thresholds", post(threshold_update))
        .route("/api/system_status", get(system_status))
        .route("/api/control", get(control_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to `addr` and serves the API endpoints backed by `engine` until the
/// provided shutdown signal is triggered.
///
/// # Returns
/// Returns Ok(()) if the server shuts down gracefully, or an error if binding fails
pub async fn serve(
    engine: Arc<Engine>,
    addr: SocketAddr,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> std::io::Result<()> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState { version, engine });
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Starting HTTP API server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await
}
