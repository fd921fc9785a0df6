use super::aggregate::{aggregate, Stats, TimePeriod};
use crate::common::events::{Event, EventType, NOT_AVAILABLE};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

/// 汇总接口附带的最近事件条数
pub const SUMMARY_RECENT_EVENTS: usize = 50;

/// 汇总视图：统计项 + 最近事件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub stats: Stats,
    pub recent_events: Vec<Event>,
    pub total_events: usize,
    pub time_period: TimePeriod,
}

/// 最近活动条目（新事件在前）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub details: String,
}

pub fn summary(events: &[Event]) -> Summary {
    let stats = aggregate(events);
    let time_period = stats.time_period.clone();
    Summary {
        recent_events: tail(events, SUMMARY_RECENT_EVENTS).to_vec(),
        total_events: events.len(),
        time_period,
        stats,
    }
}

pub fn recent_activity(events: &[Event], limit: usize) -> Vec<Activity> {
    tail(events, limit)
        .iter()
        .rev()
        .map(|event| Activity {
            id: event.id.clone(),
            kind: event.event_type,
            timestamp: event.timestamp,
            url: event.url().unwrap_or(NOT_AVAILABLE).to_string(),
            details: describe(event),
        })
        .collect()
}

/// 指定类型的最近 `limit` 条事件，保持时间顺序
pub fn events_by_type(events: &[Event], event_type: EventType, limit: usize) -> Vec<Event> {
    let matching: Vec<&Event> = events
        .iter()
        .filter(|e| e.event_type == event_type)
        .collect();
    tail(&matching, limit).iter().map(|e| (*e).clone()).collect()
}

/// 时间戳落在 `[start, end]` 闭区间内的事件
pub fn events_in_range(events: &[Event], start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Event> {
    events
        .iter()
        .filter(|e| e.timestamp >= start && e.timestamp <= end)
        .cloned()
        .collect()
}

/// 生成一句人类可读的事件描述
pub fn describe(event: &Event) -> String {
    match event.event_type {
        EventType::PageView => format!(
            "Page viewed: {}",
            event.field("title").unwrap_or("Unknown")
        ),
        EventType::ResumeDownload => format!(
            "Resume downloaded from: {}",
            event.url().unwrap_or("Unknown page")
        ),
        EventType::FormSubmission => format!(
            "Form submitted: {}",
            event.field("form_type").unwrap_or("Unknown form")
        ),
        EventType::ExternalLinkClick => format!(
            "External link clicked: {}",
            event.url().unwrap_or("Unknown link")
        ),
        EventType::ProjectInteraction => format!(
            "Project interaction: {}",
            event.field("action").unwrap_or("Unknown action")
        ),
        other => format!("Event: {}", other),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// 解析区间端点：接受 RFC 3339 时间戳或 `YYYY-MM-DD`
///
/// 纯日期作为起点取当天 00:00:00，作为终点取当天最后一刻。
pub fn parse_bound(raw: &str, bound: Bound) -> anyhow::Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid date '{}': {}", raw, e))?;
    let time = match bound {
        Bound::Start => NaiveTime::MIN,
        Bound::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
            .ok_or_else(|| anyhow::anyhow!("invalid end-of-day time"))?,
    };
    Ok(date.and_time(time).and_utc())
}

fn tail<T>(items: &[T], limit: usize) -> &[T] {
    &items[items.len().saturating_sub(limit)..]
}
