// Read-only status API

use crate::clients::ClientRegistry;
use crate::engine::{DecisionEngine, StatsSnapshot};
use crate::inventory::{DeviceDirectory, DeviceInventory};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Status API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_enabled() -> bool {
    true
}

fn default_port() -> u16 {
    8080
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            port: default_port(),
        }
    }
}

/// Shared state for the status API
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<DecisionEngine>,
    pub clients: Arc<ClientRegistry>,
    pub directory: Arc<DeviceDirectory>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct DevicesResponse {
    #[serde(flatten)]
    inventory: DeviceInventory,
    /// Every room seen since startup, not just those in this inventory
    known_rooms: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/clients", get(list_clients))
        .route("/api/devices", get(devices))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /api/stats - decision counters and store sizes
async fn stats(State(state): State<ApiState>) -> Json<StatsSnapshot> {
    Json(state.engine.stats())
}

/// GET /api/clients - registered listeners by name
async fn list_clients(State(state): State<ApiState>) -> Json<BTreeMap<String, Ipv4Addr>> {
    Json(state.clients.list())
}

/// GET /api/devices - latest device inventory
async fn devices(State(state): State<ApiState>) -> Result<Json<DevicesResponse>, ApiError> {
    let inventory = state.directory.latest().ok_or(ApiError::NoInventory)?;
    Ok(Json(DevicesResponse {
        inventory,
        known_rooms: state.directory.rooms(),
    }))
}

#[derive(Debug)]
enum ApiError {
    NoInventory,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NoInventory => (StatusCode::NOT_FOUND, "No device inventory received yet"),
        };

        (
            status,
            Json(ErrorResponse {
                error: message.to_string(),
            }),
        )
            .into_response()
    }
}
