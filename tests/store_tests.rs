use folio_pulse::analytics::aggregate;
use folio_pulse::common::events::{Event, EventType};
use folio_pulse::storage::{EventBackend, EventStore, ImportDocument, MemoryBackend};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn page_view(url: &str, session: &str) -> Event {
    Event::new(EventType::PageView, session, payload(json!({ "url": url })))
}

/// 记录每次 save 内容的后端，可模拟写入失败
#[derive(Default, Clone)]
struct RecordingBackend {
    saved: Arc<Mutex<Vec<Vec<Event>>>>,
    fail_saves: bool,
    initial: Vec<Event>,
}

impl EventBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn load(&self) -> anyhow::Result<Vec<Event>> {
        Ok(self.initial.clone())
    }

    fn save(&self, events: &[Event]) -> anyhow::Result<()> {
        if self.fail_saves {
            anyhow::bail!("disk full");
        }
        self.saved.lock().unwrap().push(events.to_vec());
        Ok(())
    }
}

struct BrokenLoad;

impl EventBackend for BrokenLoad {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn load(&self) -> anyhow::Result<Vec<Event>> {
        anyhow::bail!("corrupt store")
    }

    fn save(&self, _events: &[Event]) -> anyhow::Result<()> {
        Ok(())
    }
}

#[test]
fn append_past_cap_evicts_oldest() {
    let store = EventStore::new(Box::new(MemoryBackend), 1000);
    let mut originals = Vec::new();
    for i in 0..1001 {
        let event = page_view(&format!("/p{}", i), "s1");
        originals.push(event.clone());
        store.append(event);
    }

    let events = store.all();
    assert_eq!(events.len(), 1000);
    assert!(!events.iter().any(|e| e.id == originals[0].id));
    assert_eq!(events.as_slice(), &originals[1..]);
}

#[test]
fn store_never_exceeds_small_cap() {
    let store = EventStore::new(Box::new(MemoryBackend), 3);
    let mut appended = Vec::new();
    for i in 0..10 {
        let event = page_view(&format!("/{}", i), "s1");
        appended.push(event.clone());
        store.append(event);
        assert!(store.len() <= 3);
        let start = appended.len().saturating_sub(3);
        assert_eq!(store.all(), appended[start..].to_vec());
    }
    assert_eq!(store.capacity(), 3);
}

#[test]
fn clear_empties_store_and_persists() {
    let backend = RecordingBackend::default();
    let saved = backend.saved.clone();
    let store = EventStore::new(Box::new(backend), 10);
    store.append(page_view("/a", "s1"));
    store.clear();

    assert!(store.is_empty());
    let saved = saved.lock().unwrap();
    assert_eq!(saved.len(), 2);
    assert!(saved[1].is_empty());
}

#[test]
fn persistence_failure_keeps_memory_authoritative() {
    let backend = RecordingBackend {
        fail_saves: true,
        ..RecordingBackend::default()
    };
    let store = EventStore::new(Box::new(backend), 10);
    store.append(page_view("/a", "s1"));
    store.append(page_view("/b", "s2"));
    assert_eq!(store.len(), 2);
}

#[test]
fn load_failure_starts_empty() {
    let store = EventStore::new(Box::new(BrokenLoad), 10);
    assert!(store.is_empty());
    store.append(page_view("/a", "s1"));
    assert_eq!(store.len(), 1);
}

#[test]
fn oversized_history_is_trimmed_on_load() {
    let initial: Vec<Event> = (0..8).map(|i| page_view(&format!("/{}", i), "s1")).collect();
    let backend = RecordingBackend {
        initial: initial.clone(),
        ..RecordingBackend::default()
    };
    let store = EventStore::new(Box::new(backend), 5);
    assert_eq!(store.all(), initial[3..].to_vec());
}

#[test]
fn export_then_import_round_trips() {
    let source = EventStore::new(Box::new(MemoryBackend), 100);
    source.append(page_view("/a", "s1"));
    source.append(Event::new(
        EventType::FormSubmission,
        "s2",
        payload(json!({ "form_type": "contact" })),
    ));
    source.append(page_view("/b", "s2"));

    let exported = serde_json::to_value(source.export()).expect("serialize");
    assert_eq!(exported["total_events"], 3);
    assert_eq!(exported["stats"]["unique_sessions"], 2);

    let doc: ImportDocument = serde_json::from_value(exported).expect("deserialize");
    let target = EventStore::new(Box::new(MemoryBackend), 100);
    assert_eq!(target.import(doc), 3);
    assert_eq!(target.all(), source.all());
}

#[test]
fn unique_sessions_matches_distinct_ids() {
    let store = EventStore::new(Box::new(MemoryBackend), 100);
    assert_eq!(aggregate(&store.all()).unique_sessions, 0);
    for session in ["a", "b", "a", "c", "b"] {
        store.append(page_view("/", session));
    }
    assert_eq!(aggregate(&store.all()).unique_sessions, 3);
}

#[test]
fn recorded_events_never_go_back_in_time() {
    let store = EventStore::new(Box::new(MemoryBackend), 10);
    let future = chrono::Utc::now() + chrono::Duration::hours(1);
    store.append(Event::at(EventType::PageView, future, "s1", Map::new()));

    let recorded = store.record(EventType::PageExit, "s1", payload(json!({ "url": "/" })));
    assert_eq!(recorded.timestamp, future);
    assert_eq!(store.all().last(), Some(&recorded));
}

#[test]
fn record_evicts_oldest_over_cap() {
    let store = EventStore::new(Box::new(MemoryBackend), 2);
    let first = store.record(EventType::PageView, "s1", Map::new());
    store.record(EventType::PageView, "s1", Map::new());
    store.record(EventType::PageView, "s1", Map::new());
    let events = store.all();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.id != first.id));
    assert!(events[0].timestamp <= events[1].timestamp);
}
