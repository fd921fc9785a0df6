use folio_pulse::analytics::aggregate;
use folio_pulse::common::events::{Event, EventType};
use folio_pulse::storage::{EventBackend, EventStore, JsonFileBackend, SqliteBackend};
use serde_json::{json, Value};
use tempfile::tempdir;

fn page_view(url: &str, session: &str) -> Event {
    let payload = json!({ "url": url, "title": "Home" });
    Event::new(
        EventType::PageView,
        session,
        payload.as_object().cloned().unwrap_or_default(),
    )
}

#[test]
fn json_file_missing_file_loads_empty() {
    let temp_dir = tempdir().expect("tempdir");
    let backend = JsonFileBackend::new(temp_dir.path().join("analytics-data.json"));
    assert!(backend.load().expect("load").is_empty());
}

#[test]
fn json_file_document_has_events_and_stats() {
    let temp_dir = tempdir().expect("tempdir");
    let path = temp_dir.path().join("nested").join("analytics-data.json");
    let store = EventStore::new(Box::new(JsonFileBackend::new(&path)), 10);
    store.append(page_view("/a", "s1"));
    store.append(page_view("/a", "s2"));

    let raw: Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(raw["events"].as_array().map(Vec::len), Some(2));
    assert_eq!(raw["stats"]["total_page_views"], 2);
    assert_eq!(raw["stats"]["page_views_by_url"]["/a"], 2);
    assert!(!temp_dir.path().join("nested").join("analytics-data.json.tmp").exists());
}

#[test]
fn json_file_survives_restart() {
    let temp_dir = tempdir().expect("tempdir");
    let path = temp_dir.path().join("analytics-data.json");

    let first = EventStore::new(Box::new(JsonFileBackend::new(&path)), 10);
    first.append(page_view("/a", "s1"));
    first.append(page_view("/b", "s1"));
    let before = first.all();
    drop(first);

    let second = EventStore::new(Box::new(JsonFileBackend::new(&path)), 10);
    assert_eq!(second.all(), before);
}

#[test]
fn json_file_reads_legacy_document() {
    let temp_dir = tempdir().expect("tempdir");
    let path = temp_dir.path().join("analytics-data.json");
    let legacy = json!({
        "events": [{
            "id": "event_1717236000000_abc123def",
            "event_type": "page_view",
            "timestamp": "2024-06-01T10:00:00Z",
            "data": { "url": "/", "session_id": "session_1" }
        }],
        "stats": { "unique_sessions": ["session_1"], "total_page_views": 1 }
    });
    std::fs::write(&path, legacy.to_string()).expect("write");

    let events = JsonFileBackend::new(&path).load().expect("load");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].url(), Some("/"));
    assert_eq!(events[0].session_id, "session_1");
}

#[test]
fn json_file_legacy_sessions_stay_distinct() {
    let temp_dir = tempdir().expect("tempdir");
    let path = temp_dir.path().join("analytics-data.json");
    let events: Vec<Value> = ["s1", "s2", "s3"]
        .iter()
        .enumerate()
        .map(|(i, session)| {
            json!({
                "id": format!("event_171723600000{}_abc123def", i),
                "event_type": "page_view",
                "timestamp": format!("2024-06-01T10:00:0{}Z", i),
                "data": { "url": "/", "session_id": session }
            })
        })
        .collect();
    std::fs::write(&path, json!({ "events": events }).to_string()).expect("write");

    let store = EventStore::new(Box::new(JsonFileBackend::new(&path)), 10);
    assert_eq!(aggregate(&store.all()).unique_sessions, 3);
}

#[test]
fn json_file_corrupt_document_is_an_error() {
    let temp_dir = tempdir().expect("tempdir");
    let path = temp_dir.path().join("analytics-data.json");
    std::fs::write(&path, "{ not json").expect("write");
    assert!(JsonFileBackend::new(&path).load().is_err());

    let store = EventStore::new(Box::new(JsonFileBackend::new(&path)), 10);
    assert!(store.is_empty());
}

#[test]
fn sqlite_backend_round_trips_under_storage_key() {
    let temp_dir = tempdir().expect("tempdir");
    let db_path = temp_dir.path().join("analytics.db");
    let db = db_path.to_string_lossy();

    let backend = SqliteBackend::new(&db, 1, "portfolio_analytics_events").expect("backend");
    assert!(backend.load().expect("load").is_empty());

    let events = vec![page_view("/a", "s1"), page_view("/b", "s2")];
    backend.save(&events).expect("save");
    backend.save(&events[..1]).expect("overwrite");
    assert_eq!(backend.load().expect("load"), events[..1].to_vec());

    let conn = backend.get_conn().expect("conn");
    let keys: i64 = conn
        .query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))
        .expect("count");
    assert_eq!(keys, 1);
}

#[test]
fn sqlite_keys_are_isolated() {
    let temp_dir = tempdir().expect("tempdir");
    let db_path = temp_dir.path().join("analytics.db");
    let db = db_path.to_string_lossy();

    let a = SqliteBackend::new(&db, 1, "site_a").expect("a");
    let b = SqliteBackend::new(&db, 1, "site_b").expect("b");
    a.save(&[page_view("/a", "s1")]).expect("save");
    assert!(b.load().expect("load").is_empty());
    assert_eq!(a.storage_key(), "site_a");

    let store = EventStore::new(Box::new(a), 10);
    assert_eq!(store.len(), 1);
    assert_eq!(store.backend_name(), "sqlite");
}

#[test]
fn sqlite_schema_is_a_single_migration_with_timestamps() {
    let temp_dir = tempdir().expect("tempdir");
    let db_path = temp_dir.path().join("analytics.db");
    let backend =
        SqliteBackend::new(&db_path.to_string_lossy(), 1, "portfolio_analytics_events").expect("backend");
    backend.save(&[page_view("/a", "s1")]).expect("save");

    let conn = backend.get_conn().expect("conn");
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .expect("version");
    assert_eq!(version, 1);
    let updated_at: String = conn
        .query_row(
            "SELECT updated_at FROM kv_store WHERE storage_key = 'portfolio_analytics_events'",
            [],
            |row| row.get(0),
        )
        .expect("updated_at");
    assert!(updated_at.ends_with('Z'));
}
