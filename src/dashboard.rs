//! 服务端渲染的统计仪表盘
//!
//! 页面通过 `<meta http-equiv="refresh">` 定时重新请求，服务端每次重新聚合。

use crate::analytics::{recent_activity, Activity, PageViews, Stats};
use crate::common::events::{Event, EventType};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy)]
pub struct DashboardOptions {
    pub refresh_secs: u64,
    pub recent_limit: usize,
    pub top_pages: usize,
}

/// 相对时间："Just now" / "Xm ago" / "Xh ago" / 日期
pub fn relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - ts).num_milliseconds();
    if diff < 60_000 {
        "Just now".to_string()
    } else if diff < 3_600_000 {
        format!("{}m ago", diff / 60_000)
    } else if diff < 86_400_000 {
        format!("{}h ago", diff / 3_600_000)
    } else {
        ts.format("%Y-%m-%d").to_string()
    }
}

pub fn activity_label(event_type: EventType) -> &'static str {
    match event_type {
        EventType::PageView => "View",
        EventType::ResumeDownload => "Download",
        EventType::FormSubmission => "Form",
        EventType::ExternalLinkClick => "Link",
        EventType::ProjectInteraction => "Project",
        other => other.as_str(),
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// 渲染完整的仪表盘页面
pub fn render(stats: &Stats, events: &[Event], opts: DashboardOptions, now: DateTime<Utc>) -> String {
    let activities = recent_activity(events, opts.recent_limit);
    let pages = stats.top_pages(opts.top_pages);

    let mut html = String::with_capacity(4096);
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<meta http-equiv="refresh" content="{refresh}">
<title>Portfolio Analytics Dashboard</title>
<style>{css}</style>
</head>
<body>
<div class="container">
<div class="header"><h1>Portfolio Analytics</h1><p>{total} events, {sessions} sessions</p></div>
<div class="stats-grid">
"#,
        refresh = opts.refresh_secs,
        css = STYLE,
        total = stats.total_events,
        sessions = stats.unique_sessions,
    );

    for (label, value) in [
        ("Page Views", stats.total_page_views),
        ("Resume Downloads", stats.total_resume_downloads),
        ("Form Submissions", stats.total_form_submissions),
        ("External Clicks", stats.total_external_clicks),
        ("Project Interactions", stats.total_project_interactions),
        ("Unique Sessions", stats.unique_sessions as u64),
    ] {
        let _ = writeln!(
            html,
            r#"<div class="stat-card"><div class="stat-number">{}</div><div class="stat-label">{}</div></div>"#,
            value, label
        );
    }
    html.push_str("</div>\n");

    render_pages(&mut html, &pages);
    render_activity(&mut html, &activities, now);

    let _ = write!(
        html,
        r#"<div class="footer">Refreshes every {}s &middot; rendered {}</div>
</div>
</body>
</html>
"#,
        opts.refresh_secs,
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );
    html
}

fn render_pages(html: &mut String, pages: &[PageViews]) {
    html.push_str("<div class=\"section\"><h2>Top Pages</h2>\n");
    if pages.is_empty() {
        html.push_str("<div class=\"empty\">No page views yet</div>\n");
    }
    for page in pages {
        let _ = writeln!(
            html,
            r#"<div class="row"><span class="url">{}</span><span class="count">{}</span></div>"#,
            escape_html(&page.url),
            page.views
        );
    }
    html.push_str("</div>\n");
}

fn render_activity(html: &mut String, activities: &[Activity], now: DateTime<Utc>) {
    html.push_str("<div class=\"section\"><h2>Recent Activity</h2>\n");
    if activities.is_empty() {
        html.push_str("<div class=\"empty\">No recent activity</div>\n");
    }
    for activity in activities {
        let _ = writeln!(
            html,
            r#"<div class="row"><span class="type">{}</span><span class="details">{}</span><span class="time">{}</span></div>"#,
            activity_label(activity.kind),
            escape_html(&activity.details),
            relative_time(activity.timestamp, now)
        );
    }
    html.push_str("</div>\n");
}

const STYLE: &str = "body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;\
background:#f4f5fb;margin:0;padding:20px}\
.container{max-width:1100px;margin:0 auto;background:#fff;border-radius:12px;overflow:hidden}\
.header{background:#667eea;color:#fff;padding:24px;text-align:center}\
.stats-grid{display:grid;grid-template-columns:repeat(auto-fit,minmax(200px,1fr));gap:16px;padding:24px}\
.stat-card{background:#f8f9fa;border-left:4px solid #667eea;border-radius:8px;padding:16px;text-align:center}\
.stat-number{font-size:2rem;font-weight:700}\
.section{padding:0 24px 24px}\
.row{display:flex;gap:12px;padding:8px 0;border-bottom:1px solid #eee}\
.url,.details{flex:1;overflow:hidden;text-overflow:ellipsis}\
.type{min-width:80px;font-weight:600}.time,.count{color:#888}\
.empty{color:#888;padding:8px 0}.footer{padding:12px 24px;color:#aaa;font-size:.85rem}";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::aggregate;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn relative_time_buckets() {
        assert_eq!(relative_time(now() - Duration::seconds(30), now()), "Just now");
        assert_eq!(relative_time(now() - Duration::minutes(5), now()), "5m ago");
        assert_eq!(relative_time(now() - Duration::hours(3), now()), "3h ago");
        assert_eq!(relative_time(now() - Duration::days(2), now()), "2024-05-30");
    }

    #[test]
    fn labels_fall_back_to_type_name() {
        assert_eq!(activity_label(EventType::PageView), "View");
        assert_eq!(activity_label(EventType::ScrollDepth), "scroll_depth");
    }

    #[test]
    fn render_escapes_user_content() {
        let payload = json!({ "url": "/<script>", "title": "<b>hi</b>" });
        let events = vec![Event::at(
            EventType::PageView,
            now() - Duration::minutes(2),
            "s1",
            payload.as_object().cloned().unwrap_or_default(),
        )];
        let stats = aggregate(&events);
        let opts = DashboardOptions {
            refresh_secs: 30,
            recent_limit: 20,
            top_pages: 10,
        };
        let html = render(&stats, &events, opts, now());
        assert!(html.contains(r#"content="30""#));
        assert!(html.contains("/&lt;script&gt;"));
        assert!(html.contains("Page viewed: &lt;b&gt;hi&lt;/b&gt;"));
        assert!(html.contains("2m ago"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn render_empty_log() {
        let opts = DashboardOptions {
            refresh_secs: 10,
            recent_limit: 5,
            top_pages: 5,
        };
        let html = render(&Stats::default(), &[], opts, now());
        assert!(html.contains("No recent activity"));
        assert!(html.contains("No page views yet"));
    }
}
