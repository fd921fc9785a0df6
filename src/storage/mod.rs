pub mod csv;
pub mod database;
pub mod json_file;
pub mod memory;
pub mod sqlite;

use crate::analytics::{aggregate, Stats};
use crate::common::events::{Event, EventType};
use crate::config::{AnalyticsSettings, BackendKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

pub use json_file::JsonFileBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// 事件日志的持久化后端
///
/// 后端只负责整段日志的读写；容量、顺序等约束由 [`EventStore`] 维护。
pub trait EventBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn load(&self) -> anyhow::Result<Vec<Event>>;
    fn save(&self, events: &[Event]) -> anyhow::Result<()>;
}

/// 导出文档（备份 / 迁移用）
#[derive(Debug, Clone, Serialize)]
pub struct ExportDocument {
    pub export_date: DateTime<Utc>,
    pub total_events: usize,
    pub stats: Stats,
    pub events: Vec<Event>,
}

/// 导入时只关心 `events`，其余字段（导出时间、统计快照）忽略
#[derive(Debug, Clone, Deserialize)]
pub struct ImportDocument {
    pub events: Vec<Event>,
}

/// 有界、有序的事件存储
///
/// 所有写操作在同一把锁内完成"修改内存 + 持久化"，保证单写者语义。
/// 持久化失败只记录日志，内存中的日志始终是当前会话的权威数据。
pub struct EventStore {
    events: Mutex<VecDeque<Event>>,
    backend: Box<dyn EventBackend>,
    max_events: usize,
}

impl EventStore {
    /// 创建存储并从后端加载历史事件；加载失败时以空日志启动
    pub fn new(backend: Box<dyn EventBackend>, max_events: usize) -> Self {
        let mut events: VecDeque<Event> = match backend.load() {
            Ok(events) => events.into(),
            Err(e) => {
                warn!(
                    "[Store] Failed to load events from {} backend, starting empty: {:#}",
                    backend.name(),
                    e
                );
                VecDeque::new()
            }
        };
        let evicted = evict(&mut events, max_events);
        info!(
            "[Store] Loaded {} events via {} backend (cap {}, evicted {})",
            events.len(),
            backend.name(),
            max_events,
            evicted
        );
        Self {
            events: Mutex::new(events),
            backend,
            max_events,
        }
    }

    /// 根据配置选择后端并构造存储
    pub fn open(settings: &AnalyticsSettings) -> anyhow::Result<Self> {
        let backend = open_backend(settings)?;
        Ok(Self::new(backend, settings.max_events))
    }

    /// 追加事件；超过容量时从最旧的一端淘汰
    pub fn append(&self, event: Event) {
        let mut events = self.lock();
        self.push(&mut events, event);
    }

    /// 在锁内打时间戳并追加，保证插入顺序与时间顺序一致
    ///
    /// 时间戳不早于日志中最后一条事件，系统时钟回拨时沿用上一条的时间。
    pub fn record(
        &self,
        event_type: EventType,
        session_id: impl Into<String>,
        payload: Map<String, Value>,
    ) -> Event {
        let mut events = self.lock();
        let now = Utc::now();
        let timestamp = events.back().map_or(now, |last| last.timestamp.max(now));
        let event = Event::at(event_type, timestamp, session_id, payload);
        self.push(&mut events, event.clone());
        event
    }

    /// 当前日志的只读快照（按插入顺序）
    pub fn all(&self) -> Vec<Event> {
        self.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        let mut events = self.lock();
        events.clear();
        self.persist(&events);
        info!("[Store] All analytics data cleared");
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_events
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn export(&self) -> ExportDocument {
        let events = self.all();
        ExportDocument {
            export_date: Utc::now(),
            total_events: events.len(),
            stats: aggregate(&events),
            events,
        }
    }

    /// 用导入文档整体替换当前日志，返回保留下来的事件数
    pub fn import(&self, doc: ImportDocument) -> usize {
        let mut events = self.lock();
        *events = doc.events.into();
        let evicted = evict(&mut events, self.max_events);
        self.persist(&events);
        info!(
            "[Store] Imported {} events ({} dropped over cap)",
            events.len(),
            evicted
        );
        events.len()
    }

    /// 将当前日志写回后端（关闭时调用）
    pub fn flush(&self) {
        let events = self.lock();
        self.persist(&events);
    }

    fn push(&self, events: &mut VecDeque<Event>, event: Event) {
        events.push_back(event);
        evict(events, self.max_events);
        self.persist(events);
    }

    fn persist(&self, events: &VecDeque<Event>) {
        let (front, back) = events.as_slices();
        let result = if back.is_empty() {
            self.backend.save(front)
        } else {
            let contiguous: Vec<Event> = events.iter().cloned().collect();
            self.backend.save(&contiguous)
        };
        if let Err(e) = result {
            warn!(
                "[Store] Persisting {} events via {} backend failed: {:#}",
                events.len(),
                self.backend.name(),
                e
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        // 持锁期间只有纯内存操作和后端 I/O，不会留下半更新状态
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn evict(events: &mut VecDeque<Event>, max_events: usize) -> usize {
    let overflow = events.len().saturating_sub(max_events);
    events.drain(..overflow);
    overflow
}

/// 按配置构造持久化后端
pub fn open_backend(settings: &AnalyticsSettings) -> anyhow::Result<Box<dyn EventBackend>> {
    Ok(match settings.backend {
        BackendKind::Memory => Box::new(MemoryBackend),
        BackendKind::JsonFile => Box::new(JsonFileBackend::new(settings.data_file.clone())),
        BackendKind::Sqlite => Box::new(SqliteBackend::new(
            &settings.database_url,
            settings.max_connections,
            &settings.storage_key,
        )?),
    })
}
