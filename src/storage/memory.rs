use super::EventBackend;
use crate::common::events::Event;

/// 不做任何持久化的后端
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryBackend;

impl EventBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self) -> anyhow::Result<Vec<Event>> {
        Ok(Vec::new())
    }

    fn save(&self, _events: &[Event]) -> anyhow::Result<()> {
        Ok(())
    }
}
