use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 缺省字段的占位值
pub const UNKNOWN: &str = "unknown";
/// 展示层使用的占位值
pub const NOT_AVAILABLE: &str = "N/A";

/// 访客交互事件类型（封闭枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PageView,
    PageLoad,
    ResumeDownload,
    FormSubmission,
    ExternalLinkClick,
    ProjectInteraction,
    ScrollDepth,
    TimeOnPage,
    PageExit,
}

impl EventType {
    pub const ALL: [EventType; 9] = [
        EventType::PageView,
        EventType::PageLoad,
        EventType::ResumeDownload,
        EventType::FormSubmission,
        EventType::ExternalLinkClick,
        EventType::ProjectInteraction,
        EventType::ScrollDepth,
        EventType::TimeOnPage,
        EventType::PageExit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PageView => "page_view",
            EventType::PageLoad => "page_load",
            EventType::ResumeDownload => "resume_download",
            EventType::FormSubmission => "form_submission",
            EventType::ExternalLinkClick => "external_link_click",
            EventType::ProjectInteraction => "project_interaction",
            EventType::ScrollDepth => "scroll_depth",
            EventType::TimeOnPage => "time_on_page",
            EventType::PageExit => "page_exit",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType(pub String);

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type '{}'", self.0)
    }
}

impl std::error::Error for UnknownEventType {}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// 单条访客交互记录
///
/// 创建后不可变；只会因容量淘汰或显式清空而被删除。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredEvent")]
pub struct Event {
    pub id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub payload: Map<String, Value>,
}

/// 反序列化时的原始形态
///
/// 旧版文档把会话标识放在 `data.session_id` 中，顶层没有 `session_id`。
#[derive(Deserialize)]
struct StoredEvent {
    id: String,
    event_type: EventType,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default, alias = "data")]
    payload: Map<String, Value>,
}

impl From<StoredEvent> for Event {
    fn from(raw: StoredEvent) -> Self {
        let session_id = raw
            .session_id
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                raw.payload
                    .get("session_id")
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            id: raw.id,
            event_type: raw.event_type,
            timestamp: raw.timestamp,
            session_id,
            payload: raw.payload,
        }
    }
}

impl Event {
    /// 以当前时间创建事件
    pub fn new(
        event_type: EventType,
        session_id: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self::at(event_type, Utc::now(), session_id, payload)
    }

    pub fn at(
        event_type: EventType,
        timestamp: DateTime<Utc>,
        session_id: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Self {
        let session_id = session_id.into();
        let session_id = if session_id.trim().is_empty() {
            UNKNOWN.to_string()
        } else {
            session_id
        };
        Self {
            id: generate_id("event", timestamp),
            event_type,
            timestamp,
            session_id,
            payload,
        }
    }

    /// 读取 payload 中的字符串字段，空串视为缺失
    pub fn field(&self, key: &str) -> Option<&str> {
        self.payload
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn url(&self) -> Option<&str> {
        self.field("url")
    }

    /// 是否带有真实的会话标识（占位值 `unknown` 不算）
    pub fn has_session(&self) -> bool {
        self.session_id != UNKNOWN
    }
}

/// 生成会话标识：`session_<毫秒时间戳>_<随机后缀>`
pub fn generate_session_id() -> String {
    generate_id("session", Utc::now())
}

fn generate_id(prefix: &str, at: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!("{}_{}_{}", prefix, at.timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_event_takes_session_from_data() {
        let raw = json!({
            "id": "event_1717236000000_abc123def",
            "event_type": "page_view",
            "timestamp": "2024-06-01T10:00:00Z",
            "data": { "url": "/", "session_id": "session_1" }
        });
        let event: Event = serde_json::from_value(raw).expect("event");
        assert_eq!(event.session_id, "session_1");
        assert_eq!(event.url(), Some("/"));
        assert!(event.has_session());
    }

    #[test]
    fn top_level_session_wins_over_payload() {
        let raw = json!({
            "id": "event_1",
            "event_type": "page_exit",
            "timestamp": "2024-06-01T10:00:00Z",
            "session_id": "outer",
            "payload": { "session_id": "inner" }
        });
        let event: Event = serde_json::from_value(raw).expect("event");
        assert_eq!(event.session_id, "outer");
    }

    #[test]
    fn missing_session_falls_back_to_unknown() {
        let raw = json!({
            "id": "event_2",
            "event_type": "scroll_depth",
            "timestamp": "2024-06-01T10:00:00Z",
            "session_id": "  ",
            "payload": { "depth": 25 }
        });
        let event: Event = serde_json::from_value(raw).expect("event");
        assert_eq!(event.session_id, UNKNOWN);
        assert!(!event.has_session());
    }

    #[test]
    fn serialized_event_reads_back_unchanged() {
        let event = Event::new(
            EventType::FormSubmission,
            "session_9",
            json!({ "form_type": "contact" }).as_object().cloned().unwrap_or_default(),
        );
        let text = serde_json::to_string(&event).expect("json");
        assert_eq!(serde_json::from_str::<Event>(&text).expect("event"), event);
    }
}
