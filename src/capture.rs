//! 事件采集：把页面上的原始交互信号翻译成 [`Event`]
//!
//! 每个浏览会话对应一个 [`SessionTracker`]，它持有会话标识以及
//! 滚动阈值、隐藏时长等需要跨信号累计的状态。采集永不失败，
//! 缺失的字段以 `"unknown"` 占位。

use crate::common::events::{generate_session_id, Event, EventType, UNKNOWN};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use url::Url;

/// 触发 `scroll_depth` 事件的滚动百分比阈值
pub const SCROLL_THRESHOLDS: [u8; 5] = [25, 50, 75, 90, 100];

/// 页面侧的原始信号
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    PageView {
        url: String,
        title: Option<String>,
        referrer: Option<String>,
    },
    PageLoad {
        url: String,
        load_time_ms: f64,
        referrer: Option<String>,
    },
    Scroll {
        url: String,
        scroll_top: f64,
        document_height: f64,
        viewport_height: f64,
    },
    VisibilityChange {
        hidden: bool,
        at: DateTime<Utc>,
    },
    TimeOnPage {
        url: String,
        at: DateTime<Utc>,
    },
    PageExit {
        url: String,
        at: DateTime<Utc>,
    },
    ResumeDownload {
        url: String,
        button_text: Option<String>,
        href: Option<String>,
    },
    LinkClick {
        href: String,
        text: Option<String>,
        source_url: String,
    },
    FormSubmit {
        url: String,
        form_class: Option<String>,
        form_id: Option<String>,
    },
    ProjectInteraction {
        url: String,
        action: Option<String>,
        project: Option<String>,
    },
}

/// 单个浏览会话的采集状态
#[derive(Debug, Clone)]
pub struct SessionTracker {
    session_id: String,
    site_host: Option<String>,
    started_at: DateTime<Utc>,
    reached: BTreeSet<u8>,
    max_scroll_depth: u8,
    hidden_ms: i64,
    hidden_since: Option<DateTime<Utc>>,
}

impl SessionTracker {
    /// `site_host` 为站点自身域名，用于区分外链；为 `None` 时取点击来源页的域名
    pub fn new(site_host: Option<&str>) -> Self {
        Self::started_at(site_host, Utc::now())
    }

    pub fn started_at(site_host: Option<&str>, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id: generate_session_id(),
            site_host: site_host.map(|h| h.to_ascii_lowercase()),
            started_at,
            reached: BTreeSet::new(),
            max_scroll_depth: 0,
            hidden_ms: 0,
            hidden_since: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn max_scroll_depth(&self) -> u8 {
        self.max_scroll_depth
    }

    /// 处理一个信号，返回由此产生的事件（可能为空，滚动信号可能一次跨越多个阈值）
    pub fn observe(&mut self, signal: Signal) -> Vec<Event> {
        match signal {
            Signal::PageView {
                url,
                title,
                referrer,
            } => self.emit(
                EventType::PageView,
                json!({
                    "url": url,
                    "title": or_unknown(title),
                    "referrer": referrer.unwrap_or_default(),
                }),
            ),
            Signal::PageLoad {
                url,
                load_time_ms,
                referrer,
            } => self.emit(
                EventType::PageLoad,
                json!({
                    "url": url,
                    "load_time": load_time_ms,
                    "referrer": referrer.unwrap_or_default(),
                }),
            ),
            Signal::Scroll {
                url,
                scroll_top,
                document_height,
                viewport_height,
            } => {
                let depth = scroll_percentage(scroll_top, document_height, viewport_height);
                self.max_scroll_depth = self.max_scroll_depth.max(depth);
                let crossed: Vec<u8> = SCROLL_THRESHOLDS
                    .iter()
                    .copied()
                    .filter(|t| depth >= *t && self.reached.insert(*t))
                    .collect();
                crossed
                    .into_iter()
                    .flat_map(|threshold| {
                        self.emit(
                            EventType::ScrollDepth,
                            json!({ "depth": threshold, "url": url }),
                        )
                    })
                    .collect()
            }
            Signal::VisibilityChange { hidden, at } => {
                if hidden {
                    self.hidden_since.get_or_insert(at);
                } else if let Some(since) = self.hidden_since.take() {
                    self.hidden_ms += (at - since).num_milliseconds().max(0);
                }
                Vec::new()
            }
            Signal::TimeOnPage { url, at } => {
                let seconds = (at - self.started_at).num_milliseconds().max(0) as f64 / 1000.0;
                self.emit_at(
                    EventType::TimeOnPage,
                    at,
                    json!({ "time_seconds": seconds.round() as i64, "url": url }),
                )
            }
            Signal::PageExit { url, at } => {
                let total = (at - self.started_at).num_milliseconds().max(0);
                let hidden = self.hidden_ms
                    + self
                        .hidden_since
                        .map(|since| (at - since).num_milliseconds().max(0))
                        .unwrap_or(0);
                self.emit_at(
                    EventType::PageExit,
                    at,
                    json!({
                        "total_time": total,
                        "active_time": (total - hidden).max(0),
                        "hidden_time": hidden,
                        "url": url,
                    }),
                )
            }
            Signal::ResumeDownload {
                url,
                button_text,
                href,
            } => self.emit(
                EventType::ResumeDownload,
                json!({
                    "url": url,
                    "button_text": or_unknown(button_text),
                    "button_href": or_unknown(href),
                }),
            ),
            Signal::LinkClick {
                href,
                text,
                source_url,
            } => {
                if !self.is_external(&href, &source_url) {
                    return Vec::new();
                }
                self.emit(
                    EventType::ExternalLinkClick,
                    json!({
                        "url": href,
                        "text": or_unknown(text),
                        "source_url": source_url,
                    }),
                )
            }
            Signal::FormSubmit {
                url,
                form_class,
                form_id,
            } => self.emit(
                EventType::FormSubmission,
                json!({
                    "form_type": or_unknown(form_class),
                    "form_id": present(form_id).unwrap_or_else(|| "no-id".to_string()),
                    "url": url,
                }),
            ),
            Signal::ProjectInteraction {
                url,
                action,
                project,
            } => self.emit(
                EventType::ProjectInteraction,
                json!({
                    "action": present(action).unwrap_or_else(|| "unknown_action".to_string()),
                    "project": present(project).unwrap_or_else(|| "Unknown Project".to_string()),
                    "url": url,
                }),
            ),
        }
    }

    fn is_external(&self, href: &str, source_url: &str) -> bool {
        let source = Url::parse(source_url).ok();
        let target = match Url::parse(href) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                match source.as_ref().and_then(|base| base.join(href).ok()) {
                    Some(url) => url,
                    None => return false,
                }
            }
            Err(_) => return false,
        };
        let Some(target_host) = target.host_str() else {
            return false;
        };
        let site_host = self
            .site_host
            .clone()
            .or_else(|| source.as_ref().and_then(|s| s.host_str().map(str::to_string)));
        match site_host {
            Some(site) => !target_host.eq_ignore_ascii_case(&site),
            None => true,
        }
    }

    fn emit(&self, event_type: EventType, payload: Value) -> Vec<Event> {
        self.emit_at(event_type, Utc::now(), payload)
    }

    fn emit_at(&self, event_type: EventType, at: DateTime<Utc>, payload: Value) -> Vec<Event> {
        let mut payload: Map<String, Value> = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        payload.insert("session_id".into(), Value::String(self.session_id.clone()));
        vec![Event::at(event_type, at, self.session_id.clone(), payload)]
    }
}

/// 滚动百分比（0-100）；页面不可滚动时视为已看完
pub fn scroll_percentage(scroll_top: f64, document_height: f64, viewport_height: f64) -> u8 {
    let scrollable = document_height - viewport_height;
    if !scrollable.is_finite() || scrollable <= 0.0 {
        return 100;
    }
    let pct = (scroll_top.max(0.0) / scrollable * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn or_unknown(value: Option<String>) -> String {
    present(value).unwrap_or_else(|| UNKNOWN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn tracker() -> SessionTracker {
        SessionTracker::started_at(
            Some("portfolio.example"),
            Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
        )
    }

    fn scroll(top: f64) -> Signal {
        Signal::Scroll {
            url: "https://portfolio.example/".into(),
            scroll_top: top,
            document_height: 1100.0,
            viewport_height: 100.0,
        }
    }

    #[test]
    fn scroll_thresholds_fire_once_each() {
        let mut t = tracker();
        let first = t.observe(scroll(500.0));
        let depths: Vec<i64> = first
            .iter()
            .filter_map(|e| e.payload["depth"].as_i64())
            .collect();
        assert_eq!(depths, vec![25, 50]);

        assert!(t.observe(scroll(400.0)).is_empty());

        let rest = t.observe(scroll(1000.0));
        assert_eq!(rest.len(), 3);
        assert!(t.observe(scroll(1000.0)).is_empty());
        assert_eq!(t.max_scroll_depth(), 100);
    }

    #[test]
    fn unscrollable_page_counts_as_fully_seen() {
        assert_eq!(scroll_percentage(0.0, 600.0, 800.0), 100);
        assert_eq!(scroll_percentage(-20.0, 1100.0, 100.0), 0);
    }

    #[test]
    fn internal_links_are_ignored() {
        let mut t = tracker();
        let internal = t.observe(Signal::LinkClick {
            href: "/projects".into(),
            text: Some("Projects".into()),
            source_url: "https://portfolio.example/".into(),
        });
        assert!(internal.is_empty());

        let external = t.observe(Signal::LinkClick {
            href: "https://github.com/someone".into(),
            text: None,
            source_url: "https://portfolio.example/".into(),
        });
        assert_eq!(external.len(), 1);
        assert_eq!(external[0].event_type, EventType::ExternalLinkClick);
        assert_eq!(external[0].field("text"), Some("unknown"));
    }

    #[test]
    fn link_without_host_is_ignored() {
        let mut t = tracker();
        let events = t.observe(Signal::LinkClick {
            href: "mailto:someone@example.com".into(),
            text: None,
            source_url: "https://portfolio.example/".into(),
        });
        assert!(events.is_empty());
    }

    #[test]
    fn form_submission_uses_sentinels() {
        let mut t = tracker();
        let events = t.observe(Signal::FormSubmit {
            url: "https://portfolio.example/contact".into(),
            form_class: Some("  ".into()),
            form_id: None,
        });
        assert_eq!(events[0].field("form_type"), Some("unknown"));
        assert_eq!(events[0].field("form_id"), Some("no-id"));
        assert_eq!(events[0].session_id, t.session_id());
    }

    #[test]
    fn page_exit_splits_active_and_hidden_time() {
        let mut t = tracker();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        t.observe(Signal::VisibilityChange {
            hidden: true,
            at: start + Duration::seconds(10),
        });
        t.observe(Signal::VisibilityChange {
            hidden: false,
            at: start + Duration::seconds(40),
        });
        let exit = t.observe(Signal::PageExit {
            url: "https://portfolio.example/".into(),
            at: start + Duration::seconds(60),
        });
        let payload = &exit[0].payload;
        assert_eq!(payload["total_time"], 60_000);
        assert_eq!(payload["hidden_time"], 30_000);
        assert_eq!(payload["active_time"], 30_000);
        assert_eq!(exit[0].timestamp, start + Duration::seconds(60));
    }

    #[test]
    fn time_on_page_reports_whole_seconds() {
        let mut t = tracker();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let events = t.observe(Signal::TimeOnPage {
            url: "https://portfolio.example/".into(),
            at: start + Duration::milliseconds(30_400),
        });
        assert_eq!(events[0].payload["time_seconds"], 30);
    }
}
