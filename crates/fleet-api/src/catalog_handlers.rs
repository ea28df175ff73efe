//! REST API handlers for catalog management.
//!
//! Provides endpoints to read the catalog and to add or remove
//! categories and devices. Every write goes through `CatalogStore`,
//! which keeps a backup of the previous document.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleet_catalog::CatalogError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::ApiState;
use crate::handlers::error_response;

/// Response wrapper for catalog endpoints.
#[derive(Serialize)]
struct CatalogResponse<T: Serialize> {
    success: bool,
    data: T,
}

impl<T: Serialize> CatalogResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

fn catalog_error(e: &CatalogError) -> Response {
    match e {
        CatalogError::Invalid(_) => error_response(&e.to_string(), StatusCode::BAD_REQUEST),
        CatalogError::NotFound(_) => error_response(&e.to_string(), StatusCode::NOT_FOUND),
        CatalogError::Conflict(_) => error_response(&e.to_string(), StatusCode::CONFLICT),
        CatalogError::Io(_) | CatalogError::Parse(_) | CatalogError::Pattern(_) => {
            error!(error = %e, "catalog operation failed");
            error_response("Internal server error", StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        error_response(&format!("invalid request body: {e}"), StatusCode::BAD_REQUEST)
    })
}

/// Request body to add a category.
#[derive(Deserialize)]
pub struct AddCategoryRequest {
    pub name: String,
}

/// Request body to add a device.
#[derive(Deserialize)]
pub struct AddDeviceRequest {
    pub category: String,
    pub name: String,
    pub address: String,
}

// ── Catalog ────────────────────────────────────────────────────

/// GET /api/catalog
pub async fn get_catalog(State(state): State<ApiState>) -> Response {
    match state.catalog.load() {
        Ok(catalog) => CatalogResponse::ok(catalog).into_response(),
        Err(e) => catalog_error(&e),
    }
}

// ── Categories ─────────────────────────────────────────────────

/// POST /api/catalog/categories
pub async fn add_category(State(state): State<ApiState>, body: Bytes) -> Response {
    let req: AddCategoryRequest = match parse_body(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.catalog.add_category(&req.name) {
        Ok(()) => (
            StatusCode::CREATED,
            CatalogResponse::ok(serde_json::json!({ "category": req.name.trim() })),
        )
            .into_response(),
        Err(e) => catalog_error(&e),
    }
}

/// DELETE /api/catalog/categories/{name}
pub async fn remove_category(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    match state.catalog.remove_category(&name) {
        Ok(removed) => CatalogResponse::ok(serde_json::json!({
            "category": name,
            "devices_removed": removed,
        }))
        .into_response(),
        Err(e) => catalog_error(&e),
    }
}

// ── Devices ────────────────────────────────────────────────────

/// POST /api/catalog/devices
pub async fn add_device(State(state): State<ApiState>, body: Bytes) -> Response {
    let req: AddDeviceRequest = match parse_body(&body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.catalog.add_device(&req.category, &req.name, &req.address) {
        Ok(entry) => (StatusCode::CREATED, CatalogResponse::ok(entry)).into_response(),
        Err(e) => catalog_error(&e),
    }
}

/// DELETE /api/catalog/devices/{category}/{name}
pub async fn remove_device(
    State(state): State<ApiState>,
    Path((category, name)): Path<(String, String)>,
) -> Response {
    match state.catalog.remove_device(&category, &name) {
        Ok(()) => CatalogResponse::ok(serde_json::json!({
            "key": fleet_core::device_key(&category, &name),
            "status": "deleted",
        }))
        .into_response(),
        Err(e) => catalog_error(&e),
    }
}
