//! Status API handlers.
//!
//! `GET /api/status` lists devices; `POST /api/status` dispatches on the
//! body's `action` field. Request bodies are decoded by hand so that every
//! malformed request still gets a JSON error body.

use std::any::Any;
use std::collections::BTreeMap;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleet_core::{DeviceEntry, DeviceKey, DeviceStatus, StatusMap, address_map, epoch_secs};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::ApiState;

/// Body of every failed request.
#[derive(Serialize)]
pub(crate) struct ErrorBody {
    success: bool,
    error: String,
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ErrorBody {
            success: false,
            error: msg.to_string(),
        }),
    )
        .into_response()
}

#[derive(Serialize)]
struct DeviceListResponse {
    success: bool,
    devices: Vec<DeviceEntry>,
    timestamp: u64,
}

#[derive(Serialize)]
struct SingleCheckResponse {
    success: bool,
    key: Option<String>,
    address: String,
    status: DeviceStatus,
    timestamp: u64,
}

#[derive(Serialize)]
struct BatchCheckResponse {
    success: bool,
    results: StatusMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    timestamp: u64,
}

impl BatchCheckResponse {
    fn new(results: StatusMap, count: Option<usize>) -> Json<Self> {
        Json(Self {
            success: true,
            results,
            count,
            timestamp: epoch_secs(),
        })
    }
}

/// Load the catalog for a status request. An unreadable or corrupt
/// catalog reads as empty.
fn load_entries(state: &ApiState) -> Vec<DeviceEntry> {
    match state.catalog.entries() {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "catalog unavailable, treating as empty");
            Vec::new()
        }
    }
}

// ── Status ─────────────────────────────────────────────────────

/// GET /api/status
pub async fn list_devices(State(state): State<ApiState>) -> Response {
    Json(DeviceListResponse {
        success: true,
        devices: load_entries(&state),
        timestamp: epoch_secs(),
    })
    .into_response()
}

/// POST /api/status
pub async fn status_action(State(state): State<ApiState>, body: Bytes) -> Response {
    let request: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "status request body is not JSON");
            return error_response("Invalid action", StatusCode::BAD_REQUEST);
        }
    };

    match request.get("action").and_then(Value::as_str) {
        Some("check_single") => check_single(&state, &request).await,
        Some("check_batch") => check_batch(&state, &request).await,
        Some("check_all") => check_all(&state).await,
        other => {
            debug!(action = ?other, "unknown status action");
            error_response("Invalid action", StatusCode::BAD_REQUEST)
        }
    }
}

async fn check_single(state: &ApiState, request: &Value) -> Response {
    let address = request
        .get("address")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if address.is_empty() {
        return error_response("Address required", StatusCode::BAD_REQUEST);
    }
    let key = request.get("key").and_then(Value::as_str).map(str::to_string);

    let status = state.batch.checker().check(address).await;
    Json(SingleCheckResponse {
        success: true,
        key,
        address: address.to_string(),
        status,
        timestamp: epoch_secs(),
    })
    .into_response()
}

async fn check_batch(state: &ApiState, request: &Value) -> Response {
    let Some(devices) = request
        .get("devices")
        .and_then(Value::as_array)
        .filter(|d| !d.is_empty())
    else {
        return error_response("Devices array required", StatusCode::BAD_REQUEST);
    };

    let mut entries: BTreeMap<DeviceKey, String> = BTreeMap::new();
    let mut skipped = 0usize;
    for device in devices {
        let Some(key) = device.get("key").and_then(Value::as_str) else {
            skipped += 1;
            continue;
        };
        let address = device
            .get("address")
            .and_then(Value::as_str)
            .unwrap_or_default();
        entries.insert(key.to_string(), address.to_string());
    }
    if skipped > 0 {
        warn!(skipped, "batch items without a key ignored");
    }

    let results = state.batch.check_many(&entries).await;
    BatchCheckResponse::new(results, None).into_response()
}

async fn check_all(state: &ApiState) -> Response {
    let entries = load_entries(state);
    if entries.is_empty() {
        return BatchCheckResponse::new(StatusMap::new(), None).into_response();
    }

    let results = state.batch.check_many(&address_map(&entries)).await;
    let count = results.len();
    BatchCheckResponse::new(results, Some(count)).into_response()
}

// ── Fallbacks ──────────────────────────────────────────────────

/// GET /health
pub async fn health() -> Response {
    Json(serde_json::json!({ "success": true, "status": "ok" })).into_response()
}

pub async fn method_not_allowed() -> Response {
    error_response("Method not allowed", StatusCode::METHOD_NOT_ALLOWED)
}

pub async fn not_found() -> Response {
    error_response("Not found", StatusCode::NOT_FOUND)
}

/// Response for a handler that panicked.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "request handler panicked");
    error_response("Internal server error", StatusCode::INTERNAL_SERVER_ERROR)
}
