use crate::common::events::{Event, EventType};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// 事件日志覆盖的时间区间，空日志时两端均为 null
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimePeriod {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageViews {
    pub url: String,
    pub views: u64,
}

/// 由事件日志即时推导出的统计视图，不单独持久化
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_events: usize,
    pub total_page_views: u64,
    pub total_resume_downloads: u64,
    pub total_form_submissions: u64,
    pub total_external_clicks: u64,
    pub total_project_interactions: u64,
    pub unique_sessions: usize,
    pub events_by_type: BTreeMap<EventType, u64>,
    pub page_views_by_url: BTreeMap<String, u64>,
    pub time_period: TimePeriod,
    /// 按首次出现顺序排列的页面浏览计数，用于 top pages 的稳定排序
    #[serde(skip)]
    page_views: Vec<PageViews>,
}

impl Stats {
    /// 浏览量最高的页面：按次数降序，次数相同时保持首次出现顺序
    pub fn top_pages(&self, limit: usize) -> Vec<PageViews> {
        let mut pages = self.page_views.clone();
        // sort_by 是稳定排序
        pages.sort_by(|a, b| b.views.cmp(&a.views));
        pages.truncate(limit);
        pages
    }

    pub fn count(&self, event_type: EventType) -> u64 {
        self.events_by_type.get(&event_type).copied().unwrap_or(0)
    }
}

/// 单次线性扫描计算全部统计项
pub fn aggregate(events: &[Event]) -> Stats {
    let mut stats = Stats {
        total_events: events.len(),
        ..Stats::default()
    };
    let mut sessions: HashSet<&str> = HashSet::new();
    let mut page_index: HashMap<&str, usize> = HashMap::new();

    for event in events {
        *stats.events_by_type.entry(event.event_type).or_insert(0) += 1;
        if event.has_session() {
            sessions.insert(event.session_id.as_str());
        }

        let period = &mut stats.time_period;
        if period.start.map_or(true, |start| event.timestamp < start) {
            period.start = Some(event.timestamp);
        }
        if period.end.map_or(true, |end| event.timestamp > end) {
            period.end = Some(event.timestamp);
        }

        match event.event_type {
            EventType::PageView => {
                stats.total_page_views += 1;
                if let Some(url) = event.url() {
                    match page_index.get(url) {
                        Some(&idx) => stats.page_views[idx].views += 1,
                        None => {
                            page_index.insert(url, stats.page_views.len());
                            stats.page_views.push(PageViews {
                                url: url.to_string(),
                                views: 1,
                            });
                        }
                    }
                }
            }
            EventType::ResumeDownload => stats.total_resume_downloads += 1,
            EventType::FormSubmission => stats.total_form_submissions += 1,
            EventType::ExternalLinkClick => stats.total_external_clicks += 1,
            EventType::ProjectInteraction => stats.total_project_interactions += 1,
            _ => {}
        }
    }

    stats.unique_sessions = sessions.len();
    stats.page_views_by_url = stats
        .page_views
        .iter()
        .map(|p| (p.url.clone(), p.views))
        .collect();
    stats
}
