use crate::common::events::Event;
use crate::runtime::bus::{EventBus, Subscription, WILDCARD};
use crate::web::state::AppState;
use axum::extract::{
    ws::{Message, WebSocket, WebSocketUpgrade},
    Query, State,
};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct LiveQuery {
    pub types: Option<String>,
}

/// 推送给仪表盘的帧
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LiveFrame<'a> {
    /// 连接建立后的第一帧，回显总线实际接受的类型（未知类型已剔除）
    Subscribed { types: &'a [String] },
    Event { event: &'a Event },
}

/// 实时事件推送：`/api/analytics/ws?types=page_view,resume_download`
pub async fn live_feed_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LiveQuery>,
) -> impl IntoResponse {
    let types = requested_types(query.types.as_deref());
    let event_bus = state.event_bus.clone();
    ws.on_upgrade(move |socket| stream_events(socket, event_bus, types))
}

/// 解析逗号分隔的类型列表，去重并统一为小写；为空时订阅全部
fn requested_types(raw: Option<&str>) -> Vec<String> {
    let mut types: Vec<String> = Vec::new();
    for t in raw.unwrap_or_default().split(',') {
        let t = t.trim().to_ascii_lowercase();
        if !t.is_empty() && !types.contains(&t) {
            types.push(t);
        }
    }
    if types.is_empty() {
        types.push(WILDCARD.to_string());
    }
    types
}

async fn send_frame(socket: &mut WebSocket, frame: &LiveFrame<'_>) -> bool {
    match serde_json::to_string(frame) {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(err) => {
            tracing::warn!("[Live] Failed to encode frame: {}", err);
            true
        }
    }
}

async fn stream_events(mut socket: WebSocket, event_bus: Arc<EventBus>, types: Vec<String>) {
    let client_id = format!("live-{}", Uuid::new_v4().simple());
    let Some(Subscription { topics, mut rx }) = event_bus.subscribe(&client_id, &types).await
    else {
        return;
    };
    tracing::debug!("[Live] {} watching {:?}", client_id, topics);

    if send_frame(&mut socket, &LiveFrame::Subscribed { types: &topics }).await {
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    if !send_frame(&mut socket, &LiveFrame::Event { event: &event }).await {
                        break;
                    }
                }
                incoming = socket.recv() => match incoming {
                    // 仪表盘不会发送业务消息，只关心断开
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    event_bus.unsubscribe(&client_id).await;
    tracing::debug!("[Live] {} disconnected", client_id);
}
