//! fleet-api — REST API for Fleetwatch.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/status` | List catalog devices |
//! | POST | `/api/status` | `check_single`, `check_batch`, `check_all` actions |
//! | GET | `/api/catalog` | Full catalog document |
//! | POST | `/api/catalog/categories` | Add a category |
//! | DELETE | `/api/catalog/categories/{name}` | Remove a category and its devices |
//! | POST | `/api/catalog/devices` | Add a device |
//! | DELETE | `/api/catalog/devices/{category}/{name}` | Remove a device |
//! | GET | `/health` | Liveness |
//!
//! Every response body is a single JSON object. Cross-origin requests
//! are allowed from any origin. A panicking handler yields a generic 500
//! and the server keeps serving.

pub mod catalog_handlers;
pub mod handlers;

use axum::Router;
use axum::http::Method;
use axum::http::header::CONTENT_TYPE;
use axum::routing::{delete, get, post};
use fleet_catalog::CatalogStore;
use fleet_probe::{BatchCoordinator, StatusChecker};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for API handlers.
///
/// Holds no device data: every request loads the catalog afresh.
#[derive(Clone)]
pub struct ApiState {
    pub catalog: CatalogStore,
    pub batch: BatchCoordinator,
}

impl ApiState {
    pub fn new(catalog: CatalogStore, checker: StatusChecker) -> Self {
        Self {
            catalog,
            batch: BatchCoordinator::new(checker),
        }
    }

    /// Cap concurrent pings across every request served with this state.
    pub fn with_ping_limit(mut self, limit: usize) -> Self {
        self.batch = self.batch.with_ping_limit(limit);
        self
    }
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route(
            "/status",
            get(handlers::list_devices)
                .post(handlers::status_action)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/catalog",
            get(catalog_handlers::get_catalog).fallback(handlers::method_not_allowed),
        )
        .route(
            "/catalog/categories",
            post(catalog_handlers::add_category).fallback(handlers::method_not_allowed),
        )
        .route(
            "/catalog/categories/{name}",
            delete(catalog_handlers::remove_category).fallback(handlers::method_not_allowed),
        )
        .route(
            "/catalog/devices",
            post(catalog_handlers::add_device).fallback(handlers::method_not_allowed),
        )
        .route(
            "/catalog/devices/{category}/{name}",
            delete(catalog_handlers::remove_device).fallback(handlers::method_not_allowed),
        )
        .with_state(state);

    Router::new()
        .route(
            "/health",
            get(handlers::health).fallback(handlers::method_not_allowed),
        )
        .nest("/api", api_routes)
        .fallback(handlers::not_found)
        .layer(CatchPanicLayer::custom(handlers::panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// Any origin may call the API.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}
