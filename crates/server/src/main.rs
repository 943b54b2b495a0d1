use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use server_api::{
    device_statuses, device_summaries, memory_snapshot, send_command, ApiContext, Fleet,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{CommandAck, CommandRequest, DeviceSummary, MemoryEntryPayload, StatusBoard},
};
use storage::CommandMemory;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracker_client::HttpTrackerApi;

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

const MAX_REQUEST_BYTES: usize = 16 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let dialects = settings.dialect_table()?;
    let fleet = Fleet::new(settings.devices(), &dialects).context("invalid device list")?;
    let tracker_config = settings.tracker_config()?;
    if tracker_config.user_api_hash.is_none() {
        warn!("USER_API_HASH is not set; status and command requests will fail");
    }
    info!(
        devices = fleet.len(),
        upstream = %tracker_config.base_url,
        "fleet loaded"
    );

    let api = ApiContext {
        fleet: Arc::new(fleet),
        dialects: Arc::new(dialects),
        memory: CommandMemory::new(),
        tracker: Arc::new(HttpTrackerApi::new(tracker_config)),
    };
    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.server_bind))?;
    info!(%addr, "dashboard listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/devices", get(http_list_devices))
        .route("/api/get_devices_status", get(http_devices_status))
        .route("/api/send_command", post(http_send_command))
        .route("/api/command_memory", get(http_command_memory))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
        ErrorCode::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_failure(error: ApiError) -> (StatusCode, Json<ApiError>) {
    (status_for(error.code), Json(error))
}

/// Malformed command bodies are validation errors; oversized ones keep their 413.
fn invalid_body(rejection: JsonRejection) -> (StatusCode, Json<ApiError>) {
    let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        StatusCode::PAYLOAD_TOO_LARGE
    } else {
        status_for(ErrorCode::Validation)
    };
    let error = ApiError::new(ErrorCode::Validation, rejection.body_text());
    (status, Json(error))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_list_devices(State(state): State<Arc<AppState>>) -> Json<Vec<DeviceSummary>> {
    Json(device_summaries(&state.api))
}

async fn http_devices_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusBoard>, (StatusCode, Json<ApiError>)> {
    let board = device_statuses(&state.api).await.map_err(api_failure)?;
    Ok(Json(board))
}

async fn http_send_command(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandAck>, (StatusCode, Json<ApiError>)> {
    let Json(req) = payload.map_err(invalid_body)?;
    let ack = send_command(&state.api, &req.device_id, &req.command_type)
        .await
        .map_err(api_failure)?;
    Ok(Json(ack))
}

async fn http_command_memory(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<MemoryEntryPayload>> {
    Json(memory_snapshot(&state.api))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
