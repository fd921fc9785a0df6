use crate::config::Settings;
use crate::dashboard::DashboardOptions;
use crate::runtime::bus::EventBus;
use crate::storage::EventStore;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Web 应用全局状态
///
/// 启动时显式构造，通过 Arc 注入到 Axum 的 Handler 中；关闭时由 main 负责 flush。
pub struct AppState {
    pub store: EventStore,
    pub event_bus: Arc<EventBus>,
    pub config: Settings,
    /// 串行化"追加 + 推送"，使实时订阅者收到的顺序与日志一致
    pub track_lock: Mutex<()>,
}

impl AppState {
    pub fn new(store: EventStore, config: Settings) -> Self {
        let event_bus = Arc::new(EventBus::new(config.analytics.live_queue_capacity));
        Self {
            store,
            event_bus,
            config,
            track_lock: Mutex::new(()),
        }
    }

    pub fn dashboard_options(&self) -> DashboardOptions {
        DashboardOptions {
            refresh_secs: self.config.dashboard.refresh_secs,
            recent_limit: self.config.dashboard.recent_limit,
            top_pages: self.config.dashboard.top_pages,
        }
    }
}
