#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Duration, TimeZone, Utc};
use herdbook_kernel_contracts::breeding::{
    AdviceSource, CompatibilityAdvice, EvaluationLogEntry, HISTORY_LOG_CAPACITY,
};
use herdbook_kernel_contracts::pedigree::{
    Animal, AnimalRecordId, AnimalStatus, BreedingPair, Gender,
};
use herdbook_storage::breeding_history::{HistoryStore, JsonFileHistoryStore};

fn temp_dir(name: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    let base = std::env::temp_dir().join(format!("herdbook-history-test-{name}-{suffix}"));
    fs::create_dir_all(&base).unwrap();
    base
}

fn leftover_temp_files(path: &Path) -> usize {
    let Some(dir) = path.parent() else {
        return 0;
    };
    fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count()
}

fn pair(male_code: &str, female_code: &str) -> BreedingPair {
    let m = Animal::v1(
        AnimalRecordId(1),
        male_code.to_string(),
        "Duke".to_string(),
        Gender::Male,
        AnimalStatus::Active,
    )
    .unwrap();
    let f = Animal::v1(
        AnimalRecordId(2),
        female_code.to_string(),
        "Daisy".to_string(),
        Gender::Female,
        AnimalStatus::Breeding,
    )
    .unwrap();
    BreedingPair::v1(m, f).unwrap()
}

fn entry(n: u32, female_code: &str) -> EvaluationLogEntry {
    let ts = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap() + Duration::seconds(i64::from(n));
    let advice = CompatibilityAdvice::v1(
        n % 2 == 0,
        (n % 101) as u8,
        format!("evaluation #{n}"),
        vec!["Provide balanced nutrition.".to_string()],
        vec!["Check for parasites.".to_string()],
        ts,
        AdviceSource::Rules,
    )
    .unwrap();
    EvaluationLogEntry::v1(&pair("M1", female_code), advice, ts).unwrap()
}

#[test]
fn at_hist_db_01_missing_document_reads_as_empty() {
    let base = temp_dir("missing");
    let store = JsonFileHistoryStore::for_path(base.join("nested").join("history.json"));
    assert!(store.entries().unwrap().is_empty());
    fs::remove_dir_all(base).unwrap();
}

#[test]
fn at_hist_db_02_append_persists_newest_first_as_json_array() {
    let base = temp_dir("persist");
    let path = base.join("nested").join("history.json");
    let store = JsonFileHistoryStore::for_path(path.clone());
    store.append(entry(1, "F1")).unwrap();
    store.append(entry(2, "F1")).unwrap();

    let reopened = JsonFileHistoryStore::for_path(path.clone());
    let all = reopened.entries().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].advice.reasoning, "evaluation #2");

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let arr = raw.as_array().unwrap();
    assert_eq!(arr[0]["maleAnimalId"], "M1");
    assert_eq!(arr[0]["advice"]["recommendationScore"], 2);
    assert_eq!(leftover_temp_files(&path), 0);
    fs::remove_dir_all(base).unwrap();
}

#[test]
fn at_hist_db_03_capacity_evicts_oldest_entries() {
    let base = temp_dir("capacity");
    let store = JsonFileHistoryStore::for_path(base.join("history.json"));
    for n in 1..=105 {
        store.append(entry(n, "F1")).unwrap();
    }
    let all = store.entries().unwrap();
    assert_eq!(all.len(), HISTORY_LOG_CAPACITY);
    assert_eq!(all[0].advice.reasoning, "evaluation #105");
    assert_eq!(all[HISTORY_LOG_CAPACITY - 1].advice.reasoning, "evaluation #6");
    assert!(all.iter().all(|e| e.advice.reasoning != "evaluation #5"));
    fs::remove_dir_all(base).unwrap();
}

#[test]
fn at_hist_db_04_corrupt_document_is_discarded_not_fatal() {
    let base = temp_dir("corrupt");
    let path = base.join("history.json");
    fs::write(&path, b"{ this is not a history [").unwrap();
    let store = JsonFileHistoryStore::for_path(path.clone());
    assert!(store.entries().unwrap().is_empty());

    store.append(entry(7, "F1")).unwrap();
    let all = store.entries().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].advice.reasoning, "evaluation #7");
    fs::remove_dir_all(base).unwrap();
}

#[test]
fn at_hist_db_05_concurrent_appends_lose_nothing() {
    let base = temp_dir("concurrent");
    let store = Arc::new(JsonFileHistoryStore::for_path(base.join("history.json")));
    let handles: Vec<_> = (0..8u32)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..5u32 {
                    store.append(entry(t * 10 + i, "F1")).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(store.entries().unwrap().len(), 40);
    fs::remove_dir_all(base).unwrap();
}

#[test]
fn at_hist_db_06_entries_for_animal_filters_either_role() {
    let base = temp_dir("filter");
    let store = JsonFileHistoryStore::for_path(base.join("history.json"));
    store.append(entry(1, "F1")).unwrap();
    store.append(entry(2, "F2")).unwrap();
    store.append(entry(3, "F1")).unwrap();
    assert_eq!(store.entries_for_animal("F1").unwrap().len(), 2);
    assert_eq!(store.entries_for_animal("M1").unwrap().len(), 3);
    assert!(store.entries_for_animal("M9").unwrap().is_empty());
    fs::remove_dir_all(base).unwrap();
}

#[test]
fn at_hist_db_07_separate_stores_on_one_file_share_the_writer() {
    let base = temp_dir("shared-file");
    fs::create_dir_all(base.join("sub")).unwrap();
    let direct = base.join("history.json");
    let roundabout = base.join("sub").join("..").join("history.json");
    let handles: Vec<_> = (0..8u32)
        .map(|t| {
            let path = if t % 2 == 0 {
                direct.clone()
            } else {
                roundabout.clone()
            };
            thread::spawn(move || {
                let store = JsonFileHistoryStore::for_path(path);
                for i in 0..5u32 {
                    store.append(entry(t * 10 + i, "F1")).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let all = JsonFileHistoryStore::for_path(direct.clone()).entries().unwrap();
    assert_eq!(all.len(), 40);
    assert_eq!(leftover_temp_files(&direct), 0);
    fs::remove_dir_all(base).unwrap();
}
