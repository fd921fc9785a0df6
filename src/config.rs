use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// 应用配置总结构
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub analytics: AnalyticsSettings,
    pub dashboard: DashboardSettings,
    #[serde(default)]
    pub admin: AdminSettings,
}

/// 服务相关配置（监听地址、端口、请求体限制）
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// 单个上报请求体的最大字节数
    pub max_body_bytes: usize,
    /// 上报 JSON 的最大嵌套深度
    pub max_json_depth: usize,
}

/// 持久化后端类型
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// 仅内存，进程退出即丢失
    Memory,
    /// 扁平 JSON 文件 `{ events, stats }`
    JsonFile,
    /// SQLite 键值表，整段事件数组存放在固定的 storage key 下
    Sqlite,
}

/// 事件存储配置
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsSettings {
    pub backend: BackendKind,
    pub data_file: PathBuf,
    pub database_url: String,
    pub storage_key: String,
    /// 事件数量上限，超出后淘汰最旧的记录
    pub max_events: usize,
    pub max_connections: u32,
    /// 每个实时订阅者的队列容量
    pub live_queue_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardSettings {
    /// 页面自动刷新间隔（秒）
    pub refresh_secs: u64,
    pub recent_limit: usize,
    pub top_pages: usize,
}

/// 管理接口配置
///
/// 未设置 token 时管理接口不做鉴权，仅适合本机部署。
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AdminSettings {
    pub token: Option<String>,
}

impl Settings {
    /// 加载配置：支持默认值、可选配置文件、环境变量覆盖
    pub fn new() -> anyhow::Result<Self> {
        Self::load(None)
    }

    /// 同 [`Settings::new`]，但可以显式指定配置文件（必须存在）
    pub fn load(config_file: Option<&str>) -> anyhow::Result<Self> {
        let file_source = match config_file {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name("config").required(false),
        };

        let builder = Config::builder()
            // 默认值（代码内硬编码）
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.max_body_bytes", 64 * 1024)?
            .set_default("server.max_json_depth", 16)?
            .set_default("analytics.backend", "json_file")?
            .set_default("analytics.data_file", "analytics-data.json")?
            .set_default("analytics.database_url", "analytics.db")?
            .set_default("analytics.storage_key", "portfolio_analytics_events")?
            .set_default("analytics.max_events", 1000)?
            .set_default("analytics.max_connections", 2)?
            .set_default("analytics.live_queue_capacity", 64)?
            .set_default("dashboard.refresh_secs", 30)?
            .set_default("dashboard.recent_limit", 20)?
            .set_default("dashboard.top_pages", 10)?
            .add_source(file_source)
            .add_source(Environment::with_prefix("FOLIO").separator("__"));

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}
