//! Integration tests for the recording library and MIDI file interchange

use crossbeam_channel::Receiver;
use encore_lib::clock::ManualClock;
use encore_lib::config::Config;
use encore_lib::devices::MemorySink;
use encore_lib::engine::Engine;
use encore_lib::notifications::Notification;
use encore_lib::session::{RecordingStore, SqliteStore};
use std::path::Path;

type SqliteEngine = Engine<ManualClock, MemorySink<ManualClock>>;

fn engine_with_library(path: &Path) -> (SqliteEngine, ManualClock, Receiver<Notification>) {
    let clock = ManualClock::new(0.0);
    let (tx, rx) = crossbeam_channel::unbounded();
    let store = SqliteStore::open(path).unwrap();
    let config = Config {
        auto_record: false,
        ..Config::default()
    };
    let mut engine = Engine::new(clock.clone(), config, Box::new(store), tx);
    engine.select_input(Some("Keys".to_string()));
    engine.set_output(Some(MemorySink::new(clock.clone())));
    (engine, clock, rx)
}

fn record_riff(engine: &mut SqliteEngine, clock: &ManualClock) {
    assert!(engine.start_recording());
    engine.on_device_message(&[0x90, 60, 100]);
    clock.advance(250.0);
    engine.on_device_message(&[0x80, 60, 0]);
    clock.advance(250.0);
    engine.on_device_message(&[0x90, 64, 90]);
    clock.advance(500.0);
    engine.on_device_message(&[0x80, 64, 0]);
    engine.stop_recording().unwrap();
}

fn statuses(rx: &Receiver<Notification>) -> Vec<String> {
    rx.try_iter()
        .filter_map(|n| match n {
            Notification::Status(text) => Some(text),
            _ => None,
        })
        .collect()
}

#[test]
fn test_saved_recordings_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recordings.db");

    {
        let (mut engine, clock, _rx) = engine_with_library(&path);
        record_riff(&mut engine, &clock);
        assert!(engine.save_as("riff"));
    }

    let (mut engine, _clock, rx) = engine_with_library(&path);
    rx.try_iter().count();
    assert!(engine.load("riff"));
    assert_eq!(statuses(&rx), vec!["Loaded recording: \"riff\".".to_string()]);
    assert_eq!(engine.timeline().len(), 4);
    assert_eq!(engine.timeline().duration_ms(), 1000.0);
    assert_eq!(engine.current_name(), Some("riff"));

    let list = engine.list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].event_count, 4);
}

#[test]
fn test_rename_conflict_reports_and_keeps_library() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, clock, rx) = engine_with_library(&dir.path().join("lib.db"));
    record_riff(&mut engine, &clock);
    engine.save_as("one");
    engine.save_as("two");
    rx.try_iter().count();

    assert!(!engine.rename("one", "two"));
    assert_eq!(
        statuses(&rx),
        vec!["Error: A recording named \"two\" already exists.".to_string()]
    );
    let names: Vec<String> = engine.list().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["one", "two"]);
}

#[test]
fn test_save_overwrites_same_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lib.db");
    let (mut engine, clock, _rx) = engine_with_library(&path);

    record_riff(&mut engine, &clock);
    engine.save_as("take");
    // Let the riff age out of the pre-roll window
    clock.advance(5_000.0);
    assert!(engine.start_recording());
    engine.on_device_message(&[0x90, 48, 100]);
    engine.stop_recording();
    engine.save_as("take");

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.list().unwrap().len(), 1);
    assert_eq!(store.load("take").unwrap().unwrap().len(), 1);
}

#[test]
fn test_export_and_import_through_engine() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, clock, rx) = engine_with_library(&dir.path().join("lib.db"));
    record_riff(&mut engine, &clock);
    rx.try_iter().count();

    let file = dir.path().join("Riff Take.mid");
    assert!(engine.export_to(&file));
    assert_eq!(statuses(&rx), vec!["Exported as Riff Take.mid".to_string()]);

    assert!(engine.import_from(&file));
    assert_eq!(engine.current_name(), Some("Riff Take"));
    assert!(statuses(&rx).contains(&"Imported: Riff Take.mid".to_string()));

    let data: Vec<(Vec<u8>, f64)> = engine
        .timeline()
        .events()
        .iter()
        .map(|e| (e.data().to_vec(), e.timestamp_ms))
        .collect();
    assert_eq!(
        data,
        vec![
            (vec![0x90, 60, 100], 0.0),
            (vec![0x80, 60, 0], 250.0),
            (vec![0x90, 64, 90], 500.0),
            (vec![0x80, 64, 0], 1000.0),
        ]
    );
}

#[test]
fn test_import_failures_keep_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, clock, rx) = engine_with_library(&dir.path().join("lib.db"));
    record_riff(&mut engine, &clock);
    rx.try_iter().count();

    let garbage = dir.path().join("broken.mid");
    std::fs::write(&garbage, b"definitely not midi").unwrap();
    assert!(!engine.import_from(&garbage));
    assert_eq!(statuses(&rx), vec!["Error: Could not parse MIDI file.".to_string()]);
    assert_eq!(engine.timeline().len(), 4);
}

#[test]
fn test_export_requires_notes() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, _clock, rx) = engine_with_library(&dir.path().join("lib.db"));
    rx.try_iter().count();

    assert!(!engine.export_to(&dir.path().join("empty.mid")));
    assert_eq!(statuses(&rx), vec!["No recording to export.".to_string()]);
    assert!(!dir.path().join("empty.mid").exists());
}
