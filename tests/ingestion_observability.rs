mod common;

use std::sync::{Arc, Mutex};

use csv_db_loader::execution::{Dispatcher, RunOptions};
use csv_db_loader::ingestion::{LoadContext, LoadObserver, LoadSeverity, LoadStats};
use csv_db_loader::LoadError;

use common::{people_csv, write_file};

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<Vec<(String, u64)>>,
    failures: Mutex<Vec<LoadSeverity>>,
    alerts: Mutex<Vec<LoadSeverity>>,
}

impl LoadObserver for RecordingObserver {
    fn on_success(&self, _ctx: &LoadContext, stats: &LoadStats) {
        self.successes
            .lock()
            .unwrap()
            .push((stats.table.clone(), stats.rows));
    }

    fn on_failure(&self, _ctx: &LoadContext, severity: LoadSeverity, _error: &LoadError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &LoadContext, severity: LoadSeverity, _error: &LoadError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

fn dispatcher_with(obs: Arc<RecordingObserver>, alert_at_or_above: LoadSeverity) -> Dispatcher {
    Dispatcher::new(RunOptions {
        workers: 2,
        observer: Some(obs),
        alert_at_or_above,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn observer_receives_success_with_row_stats() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_file(input.path(), "people.csv", people_csv(12));

    let obs = Arc::new(RecordingObserver::default());
    dispatcher_with(obs.clone(), LoadSeverity::Critical)
        .run(input.path(), output.path(), output.path().join("errors.txt"))
        .unwrap();

    assert_eq!(
        obs.successes.lock().unwrap().clone(),
        vec![("people".to_string(), 12)]
    );
    assert!(obs.failures.lock().unwrap().is_empty());
}

#[test]
fn undecodable_file_reports_failure_without_alert_below_threshold() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_file(input.path(), "c.csv", [0u8, 1, 2, 3, 0xFF]);

    let obs = Arc::new(RecordingObserver::default());
    dispatcher_with(obs.clone(), LoadSeverity::Critical)
        .run(input.path(), output.path(), output.path().join("errors.txt"))
        .unwrap();

    assert_eq!(obs.failures.lock().unwrap().clone(), vec![LoadSeverity::Error]);
    assert!(obs.alerts.lock().unwrap().is_empty());
}

#[test]
fn failure_at_threshold_triggers_alert() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_file(input.path(), "c.csv", [0u8, 1, 2, 3, 0xFF]);

    let obs = Arc::new(RecordingObserver::default());
    dispatcher_with(obs.clone(), LoadSeverity::Error)
        .run(input.path(), output.path(), output.path().join("errors.txt"))
        .unwrap();

    assert_eq!(obs.alerts.lock().unwrap().clone(), vec![LoadSeverity::Error]);
}
