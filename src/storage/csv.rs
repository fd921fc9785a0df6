use crate::common::events::{Event, NOT_AVAILABLE};
use serde_json::Value;

/// 列名与 payload 字段（按顺序尝试）
const PAYLOAD_COLUMNS: &[(&str, &[&str])] = &[
    ("IP Address", &["ip"]),
    ("Device Type", &["device_type"]),
    ("Browser", &["browser"]),
    ("Browser Version", &["version"]),
    ("Operating System", &["os"]),
    ("Page Title", &["title", "page_title"]),
    ("Page URL", &["url", "page_url"]),
    ("Referrer", &["referrer"]),
    ("Load Time (ms)", &["load_time"]),
    ("Scroll Depth (%)", &["depth"]),
    ("Time on Page (s)", &["time_seconds"]),
    ("Form Type", &["form_type"]),
    ("User Agent", &["user_agent"]),
];

/// 导出为表格软件可直接打开的 CSV
///
/// 每个单元格都加双引号，内部的双引号写成两个；缺失字段填 `N/A`。
pub fn events_to_csv(events: &[Event]) -> String {
    let mut lines = Vec::with_capacity(events.len() + 1);

    let header: Vec<String> = ["Event Type", "Timestamp", "Session ID"]
        .into_iter()
        .chain(PAYLOAD_COLUMNS.iter().map(|(name, _)| *name))
        .map(quote)
        .collect();
    lines.push(header.join(","));

    for event in events {
        let mut row = vec![
            quote(event.event_type.as_str()),
            quote(&event.timestamp.to_rfc3339()),
            quote(&event.session_id),
        ];
        for (_, keys) in PAYLOAD_COLUMNS {
            let cell = keys
                .iter()
                .find_map(|key| cell_text(event.payload.get(*key)))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            row.push(quote(&cell));
        }
        lines.push(row.join(","));
    }

    lines.join("\n")
}

fn cell_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}
