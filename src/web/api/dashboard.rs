use crate::analytics::aggregate;
use crate::dashboard;
use crate::web::state::AppState;
use axum::{extract::State, response::Html};
use chrono::Utc;
use std::sync::Arc;

/// 仪表盘页面（`/analytics`、`/dashboard`）
pub async fn dashboard_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    let events = state.store.all();
    let stats = aggregate(&events);
    tracing::debug!("[Dashboard] Rendering {} events", events.len());
    Html(dashboard::render(
        &stats,
        &events,
        state.dashboard_options(),
        Utc::now(),
    ))
}
