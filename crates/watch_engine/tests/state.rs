use std::fs;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use watch_core::{Listing, NeighborhoodDirectory, NeighborhoodEntry, SeenStore};
use watch_engine::{JsonStateFile, MemoryStore, SnapshotStore, StoreError};

fn directory() -> NeighborhoodDirectory {
    NeighborhoodDirectory::new(&[NeighborhoodEntry {
        id: "295".into(),
        name: "Kiryat Rishon".into(),
        aliases: vec![],
    }])
    .unwrap()
}

fn sample_store() -> SeenStore {
    let seen = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    [Listing {
        id: "abc".into(),
        price: Some(2_000_000),
        rooms: Some(3.5),
        neighborhood: Some("295".into()),
        first_seen_at: Some(seen),
        last_seen_at: Some(seen),
        last_notified_price: Some(2_000_000),
        ..Listing::default()
    }]
    .into_iter()
    .collect()
}

#[test]
fn missing_file_loads_as_empty_store() {
    let temp = TempDir::new().unwrap();
    let mut state = JsonStateFile::new(temp.path().join("seen.json"));
    let store = state.load(&directory()).unwrap();
    assert!(store.is_empty());
}

#[test]
fn saved_store_loads_back() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("seen.json");

    let mut state = JsonStateFile::new(path.clone());
    state.load(&directory()).unwrap();
    state.save(&sample_store()).unwrap();

    let mut fresh = JsonStateFile::new(path);
    assert_eq!(fresh.load(&directory()).unwrap(), sample_store());
}

#[test]
fn unparsable_file_is_corrupt_state() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("seen.json");
    fs::write(&path, "{ not json").unwrap();

    let mut state = JsonStateFile::new(path.clone());
    let err = state.load(&directory()).unwrap_err();
    assert!(matches!(err, StoreError::CorruptState { .. }), "{err}");
    // Nothing was overwritten.
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
}

#[test]
fn legacy_file_is_migrated_on_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("seen.json");
    let legacy = json!({
        "https://www.yad2.co.il/realestate/item/tok1": {
            "price": 1500000,
            "sqm": 70,
            "phone": "050-1",
            "neighborhood": "Kiryat Rishon"
        }
    });
    fs::write(&path, legacy.to_string()).unwrap();

    let mut state = JsonStateFile::new(path);
    let store = state.load(&directory()).unwrap();
    let entry = store.get("tok1").unwrap();
    assert_eq!(entry.size_sqm, Some(70.0));
    assert_eq!(entry.seller_phone.as_deref(), Some("050-1"));
    assert_eq!(entry.neighborhood.as_deref(), Some("295"));
}

#[test]
fn save_refuses_when_file_changed_since_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("seen.json");

    let mut first = JsonStateFile::new(path.clone());
    first.load(&directory()).unwrap();
    first.save(&sample_store()).unwrap();

    let mut run_a = JsonStateFile::new(path.clone());
    let mut run_b = JsonStateFile::new(path.clone());
    run_a.load(&directory()).unwrap();
    run_b.load(&directory()).unwrap();

    run_b.save(&SeenStore::new()).unwrap();
    let err = run_a.save(&sample_store()).unwrap_err();
    assert!(matches!(err, StoreError::ConcurrentModification(_)), "{err}");
    assert_eq!(fs::read_to_string(&path).unwrap().trim(), "{}");
}

#[test]
fn file_created_by_another_run_is_not_overwritten() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("seen.json");

    let mut state = JsonStateFile::new(path.clone());
    state.load(&directory()).unwrap();
    fs::write(&path, "{}").unwrap();

    assert!(matches!(
        state.save(&sample_store()),
        Err(StoreError::ConcurrentModification(_))
    ));
}

#[test]
fn consecutive_saves_from_one_handle_succeed() {
    let temp = TempDir::new().unwrap();
    let mut state = JsonStateFile::new(temp.path().join("seen.json"));
    state.load(&directory()).unwrap();
    state.save(&SeenStore::new()).unwrap();
    state.save(&sample_store()).unwrap();
}

#[test]
fn memory_store_round_trips() {
    let mut state = MemoryStore::new();
    assert!(state.load(&directory()).unwrap().is_empty());
    state.save(&sample_store()).unwrap();
    assert_eq!(state.load(&directory()).unwrap(), sample_store());
    assert_eq!(state.saves(), 1);
}
