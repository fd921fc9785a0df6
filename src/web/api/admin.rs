use crate::storage::{csv, ImportDocument};
use crate::web::state::AppState;
use crate::web::utils::errors::ApiError;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Deserialize, Default)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// 导出全部事件：默认为 JSON 文档（含统计快照），`format=csv` 时为 CSV 附件
pub async fn export_handler(
    State(state): State<Arc<AppState>>,
    query: Option<Query<ExportQuery>>,
) -> Result<Response, ApiError> {
    let format = query
        .and_then(|Query(q)| q.format)
        .unwrap_or_else(|| "json".to_string());

    match format.to_ascii_lowercase().as_str() {
        "json" => {
            let doc = state.store.export();
            tracing::info!("[Admin] Exported {} events as JSON", doc.total_events);
            Ok(Json(doc).into_response())
        }
        "csv" => {
            let events = state.store.all();
            tracing::info!("[Admin] Exported {} events as CSV", events.len());
            let filename = format!(
                "attachment; filename=\"portfolio_analytics_{}.csv\"",
                Utc::now().format("%Y-%m-%d")
            );
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, filename),
                ],
                csv::events_to_csv(&events),
            )
                .into_response())
        }
        other => Err(ApiError::bad_request(format!(
            "Unsupported export format: {}",
            other
        ))),
    }
}

/// 导入导出文档，整体替换当前事件日志
pub async fn import_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let raw: Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("Invalid JSON"))?;
    if !raw.get("events").is_some_and(Value::is_array) {
        return Err(ApiError::bad_request(
            "Import document must contain an events array",
        ));
    }
    let doc: ImportDocument = serde_json::from_value(raw)
        .map_err(|e| ApiError::bad_request(format!("Invalid event in import: {}", e)))?;

    let imported = state.store.import(doc);
    Ok(Json(serde_json::json!({
        "success": true,
        "imported": imported,
        "message": format!("Imported {} events", imported)
    })))
}

/// 清空全部统计数据
pub async fn clear_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.store.clear();
    Json(serde_json::json!({
        "success": true,
        "message": "Analytics data cleared"
    }))
}
