use crate::engine::SqliteMetricStore;
use crate::MetricStore;
use chrono::{Duration, Utc};
use fleetmon_common::types::MetricKind;
use tempfile::TempDir;

fn setup() -> (TempDir, SqliteMetricStore) {
    fleetmon_common::id::init(1, 1);
    let dir = TempDir::new().unwrap();
    let store = SqliteMetricStore::open(&dir.path().join("fleetmon.db")).unwrap();
    (dir, store)
}

#[test]
fn insert_and_list_machines() {
    let (_dir, store) = setup();

    store
        .insert_machine("web-01", "http://web-01/metrics")
        .unwrap();
    store
        .insert_machine("db-01", "http://db-01/metrics")
        .unwrap();

    let machines = store.list_machines().unwrap();
    assert_eq!(machines.len(), 2);
    // Ordered by name
    assert_eq!(machines[0].name, "db-01");
    assert_eq!(machines[1].name, "web-01");
}

#[test]
fn machine_url_is_unique() {
    let (_dir, store) = setup();

    store
        .insert_machine("web-01", "http://web-01/metrics")
        .unwrap();
    let dup = store.insert_machine("web-01-copy", "http://web-01/metrics");
    assert!(dup.is_err());
}

#[test]
fn create_metric_assigns_timestamp_at_insert() {
    let (_dir, store) = setup();
    let machine = store
        .insert_machine("web-01", "http://web-01/metrics")
        .unwrap();

    let before = Utc::now() - Duration::seconds(1);
    let metric = store
        .create_metric(&machine.id, 45.2, 67.8, 23.1, "5 days, 3 hours")
        .unwrap();
    let after = Utc::now() + Duration::seconds(1);

    assert!(metric.timestamp > before && metric.timestamp < after);
    assert_eq!(metric.cpu, 45.2);
    assert_eq!(metric.uptime, "5 days, 3 hours");

    let loaded = store.get_metric(&metric.id).unwrap().unwrap();
    assert_eq!(loaded.machine_id, machine.id);
    assert_eq!(loaded.mem, 67.8);
    assert_eq!(store.count_metrics_for_machine(&machine.id).unwrap(), 1);
}

#[test]
fn long_uptime_is_truncated() {
    let (_dir, store) = setup();
    let machine = store
        .insert_machine("web-01", "http://web-01/metrics")
        .unwrap();

    let long = "x".repeat(200);
    let metric = store
        .create_metric(&machine.id, 10.0, 10.0, 10.0, &long)
        .unwrap();
    assert_eq!(metric.uptime.chars().count(), 50);
}

#[test]
fn create_and_close_incident() {
    let (_dir, store) = setup();
    let machine = store
        .insert_machine("web-01", "http://web-01/metrics")
        .unwrap();

    let incident = store
        .create_incident(&machine.id, MetricKind::Cpu, 97.5)
        .unwrap()
        .expect("first create should open an incident");
    assert!(incident.is_open());
    assert_eq!(incident.value, 97.5);

    let open = store
        .find_open_incident(&machine.id, MetricKind::Cpu)
        .unwrap()
        .unwrap();
    assert_eq!(open.id, incident.id);

    let closed = store.close_incident(&incident.id, Utc::now()).unwrap();
    assert!(closed);
    assert!(store
        .find_open_incident(&machine.id, MetricKind::Cpu)
        .unwrap()
        .is_none());

    // Closing twice is a no-op
    assert!(!store.close_incident(&incident.id, Utc::now()).unwrap());
}

#[test]
fn at_most_one_open_incident_per_machine_and_kind() {
    let (_dir, store) = setup();
    let machine = store
        .insert_machine("web-01", "http://web-01/metrics")
        .unwrap();

    let first = store
        .create_incident(&machine.id, MetricKind::Cpu, 97.5)
        .unwrap();
    assert!(first.is_some());

    // Rapid second create for the same (machine, kind) must be rejected
    let second = store
        .create_incident(&machine.id, MetricKind::Cpu, 99.0)
        .unwrap();
    assert!(second.is_none());

    // A different kind on the same machine is independent
    let mem = store
        .create_incident(&machine.id, MetricKind::Mem, 95.0)
        .unwrap();
    assert!(mem.is_some());

    let open: Vec<_> = store
        .list_incidents()
        .unwrap()
        .into_iter()
        .filter(|i| i.is_open() && i.kind == MetricKind::Cpu)
        .collect();
    assert_eq!(open.len(), 1);
}

#[test]
fn incident_can_reopen_after_close() {
    let (_dir, store) = setup();
    let machine = store
        .insert_machine("web-01", "http://web-01/metrics")
        .unwrap();

    let first = store
        .create_incident(&machine.id, MetricKind::Disk, 96.0)
        .unwrap()
        .unwrap();
    store.close_incident(&first.id, Utc::now()).unwrap();

    let second = store
        .create_incident(&machine.id, MetricKind::Disk, 98.0)
        .unwrap();
    assert!(second.is_some());
    assert_ne!(second.unwrap().id, first.id);
}

#[test]
fn find_incident_started_since_respects_window() {
    let (_dir, store) = setup();
    let machine = store
        .insert_machine("web-01", "http://web-01/metrics")
        .unwrap();

    let incident = store
        .create_incident(&machine.id, MetricKind::Mem, 92.0)
        .unwrap()
        .unwrap();

    // Started just now, so a window reaching into the past finds it
    let found = store
        .find_incident_started_since(
            &machine.id,
            MetricKind::Mem,
            Utc::now() - Duration::minutes(30),
        )
        .unwrap();
    assert_eq!(found.map(|i| i.id), Some(incident.id.clone()));

    // A window starting in the future does not
    let none = store
        .find_incident_started_since(&machine.id, MetricKind::Mem, Utc::now() + Duration::minutes(1))
        .unwrap();
    assert!(none.is_none());

    // Closing does not remove it from the window: the lookup is by start_time
    store.close_incident(&incident.id, Utc::now()).unwrap();
    let still_found = store
        .find_incident_started_since(
            &machine.id,
            MetricKind::Mem,
            Utc::now() - Duration::minutes(30),
        )
        .unwrap();
    assert!(still_found.is_some());
}

#[test]
fn delete_machine_cascades_to_metrics_and_incidents() {
    let (_dir, store) = setup();
    let machine = store
        .insert_machine("web-01", "http://web-01/metrics")
        .unwrap();
    let metric = store
        .create_metric(&machine.id, 50.0, 50.0, 50.0, "1d")
        .unwrap();
    store
        .create_incident(&machine.id, MetricKind::Cpu, 97.0)
        .unwrap()
        .unwrap();

    assert!(store.delete_machine(&machine.id).unwrap());

    assert!(store.get_machine(&machine.id).unwrap().is_none());
    assert!(store.get_metric(&metric.id).unwrap().is_none());
    assert!(store.list_incidents().unwrap().is_empty());

    // Unknown machine: nothing to delete
    assert!(!store.delete_machine("missing").unwrap());
}

#[test]
fn list_incidents_newest_first() {
    let (_dir, store) = setup();
    let machine = store
        .insert_machine("web-01", "http://web-01/metrics")
        .unwrap();

    let first = store
        .create_incident(&machine.id, MetricKind::Cpu, 90.0)
        .unwrap()
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = store
        .create_incident(&machine.id, MetricKind::Mem, 95.0)
        .unwrap()
        .unwrap();

    let incidents = store.list_incidents().unwrap();
    assert_eq!(incidents.len(), 2);
    assert_eq!(incidents[0].id, second.id);
    assert_eq!(incidents[1].id, first.id);
}
