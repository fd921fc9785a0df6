use crate::analytics::{self, parse_bound, Bound};
use crate::common::events::{EventType, UNKNOWN};
use crate::common::json_guard::{check_body, BodyLimits};
use crate::web::state::AppState;
use crate::web::utils::errors::ApiError;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

const DEFAULT_RECENT_LIMIT: usize = 20;
const DEFAULT_EVENTS_LIMIT: usize = 100;
const DEFAULT_PAGES_LIMIT: usize = 10;

/// 上报请求体 `{event_type, data}`
#[derive(Deserialize)]
pub struct TrackRequest {
    pub event_type: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// 查询参数；`limit` 按字符串接收，非法值回退到默认值
#[derive(Deserialize, Default)]
pub struct AnalyticsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<String>,
    pub event_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl AnalyticsQuery {
    fn limit_or(&self, default: usize) -> usize {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(default)
    }
}

/// 事件上报接口
pub async fn track_handler(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let limits = BodyLimits {
        max_bytes: state.config.server.max_body_bytes,
        max_depth: state.config.server.max_json_depth,
    };
    check_body(&body, limits).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let request: TrackRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("Invalid JSON"))?;
    let raw_type = request
        .event_type
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Event type is required"))?;
    let event_type = EventType::from_str(raw_type.trim())
        .map_err(|e| ApiError::bad_request(format!("Unsupported event type: {}", e.0)))?;

    let mut payload = match request.data {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let session_id = payload
        .get("session_id")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN)
        .to_string();
    payload.insert(
        "ip".into(),
        Value::String(client_ip(connect_info.map(|c| c.0), &headers)),
    );
    let agent = user_agent(&headers);
    if agent != UNKNOWN {
        crate::common::user_agent::parse(&agent).fill(&mut payload);
    }
    payload.insert("user_agent".into(), Value::String(agent));

    let event = {
        let _ordered = state.track_lock.lock().await;
        let event = state.store.record(event_type, session_id, payload);
        state.event_bus.publish(&event).await;
        event
    };
    let event_id = event.id;
    tracing::debug!("[Api] Tracked {} ({})", event.event_type, event_id);

    Ok(Json(json!({
        "success": true,
        "event_id": event_id,
        "message": "Event tracked successfully"
    })))
}

/// 统计查询接口：`type=stats|recent|events|pages|range`
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    query: Option<Query<AnalyticsQuery>>,
) -> Result<Json<Value>, ApiError> {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let events = state.store.all();

    let result = match query.kind.as_deref() {
        Some("recent") => {
            let limit = query.limit_or(DEFAULT_RECENT_LIMIT);
            serde_json::to_value(analytics::recent_activity(&events, limit))
        }
        Some("events") if query.event_type.is_some() => {
            let raw = query.event_type.as_deref().unwrap_or_default();
            let event_type = EventType::from_str(raw)
                .map_err(|e| ApiError::bad_request(format!("Unsupported event type: {}", e.0)))?;
            let limit = query.limit_or(DEFAULT_EVENTS_LIMIT);
            serde_json::to_value(analytics::events_by_type(&events, event_type, limit))
        }
        Some("pages") => {
            let limit = query.limit_or(DEFAULT_PAGES_LIMIT);
            serde_json::to_value(analytics::aggregate(&events).top_pages(limit))
        }
        Some("range") if query.start_date.is_some() && query.end_date.is_some() => {
            let bound = |raw: Option<&str>, which| {
                parse_bound(raw.unwrap_or_default(), which)
                    .map_err(|e| ApiError::bad_request(e.to_string()))
            };
            let start = bound(query.start_date.as_deref(), Bound::Start)?;
            let end = bound(query.end_date.as_deref(), Bound::End)?;
            serde_json::to_value(analytics::events_in_range(&events, start, end))
        }
        _ => serde_json::to_value(analytics::summary(&events)),
    };

    Ok(Json(result.map_err(anyhow::Error::from)?))
}

/// `/api/analytics` 上未支持的方法
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

fn client_ip(peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
    if let Some(addr) = peer {
        return addr.ip().to_string();
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}
