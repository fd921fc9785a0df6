use super::EventBackend;
use crate::analytics::{aggregate, Stats};
use crate::common::events::Event;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 扁平 JSON 文件后端
///
/// 文件结构为 `{ "events": [...], "stats": {...} }`。`stats` 只是写给人看的快照，
/// 加载时被忽略，统计始终从 `events` 重新计算。
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

#[derive(Serialize)]
struct FileDocument<'a> {
    events: &'a [Event],
    stats: Stats,
}

#[derive(Deserialize)]
struct StoredDocument {
    #[serde(default)]
    events: Vec<Event>,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "analytics-data.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl EventBackend for JsonFileBackend {
    fn name(&self) -> &'static str {
        "json_file"
    }

    fn load(&self) -> anyhow::Result<Vec<Event>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let doc: StoredDocument = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(doc.events)
    }

    fn save(&self, events: &[Event]) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let doc = FileDocument {
            events,
            stats: aggregate(events),
        };
        let body = serde_json::to_vec_pretty(&doc)?;

        // 先写临时文件再原子替换，避免读到半截文件
        let tmp = self.temp_path();
        std::fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}
