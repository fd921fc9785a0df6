pub mod api;
pub mod middleware;
pub mod state;
pub mod utils;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use self::api::{admin, analytics, dashboard, ws};
use self::middleware::auth::admin_auth;
use self::state::AppState;

/// 组装全部路由
pub fn router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/api/analytics/export", get(admin::export_handler))
        .route("/api/analytics/import", post(admin::import_handler))
        .route("/api/analytics/data", delete(admin::clear_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admin_auth,
        ));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route(
            "/api/analytics",
            get(analytics::query_handler)
                .post(analytics::track_handler)
                .fallback(analytics::method_not_allowed),
        )
        .route("/api/analytics/ws", get(ws::live_feed_handler))
        .route("/analytics", get(dashboard::dashboard_handler))
        .route("/dashboard", get(dashboard::dashboard_handler))
        .merge(admin_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}
