//! 统计聚合：每次读取时对完整事件日志做一次线性扫描

pub mod aggregate;
pub mod query;

pub use aggregate::{aggregate, PageViews, Stats, TimePeriod};
pub use query::{
    describe, events_by_type, events_in_range, parse_bound, recent_activity, summary, Activity,
    Bound, Summary,
};
