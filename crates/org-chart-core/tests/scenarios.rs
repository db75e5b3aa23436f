// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used)]
//! End-to-end flows through `OrgChart` against the in-memory store.

use std::time::{Duration, Instant};

use org_chart_core::projection;
use org_chart_core::storage::{Envelope, KeyValueStore, ORG_CHART_KEY, SCHEMA_VERSION};
use org_chart_core::{
    Command, CommandError, CommandOutcome, EmployeeId, HierarchyError, ManualClock, MemoryStore,
    NewEmployee, OrgChart,
};

fn open(store: &MemoryStore, now: Instant) -> OrgChart<MemoryStore, ManualClock> {
    OrgChart::open_with_clock(store.clone(), ManualClock::at_millis(1_700_000_000_000), now)
}

fn add(chart: &mut OrgChart<MemoryStore, ManualClock>, id: &str, manager: Option<&str>, now: Instant) {
    chart
        .dispatch(
            Command::AddEmployee {
                fields: NewEmployee::new(id.to_uppercase(), "Engineer", manager.map(EmployeeId::new)),
                id: Some(EmployeeId::new(id)),
            },
            now,
        )
        .unwrap();
}

#[test]
fn deleting_the_root_promotes_its_report() {
    let store = MemoryStore::new();
    let t0 = Instant::now();
    let mut chart = open(&store, t0);
    add(&mut chart, "e1", None, t0);
    add(&mut chart, "e2", Some("e1"), t0);

    chart
        .dispatch(Command::DeleteEmployee { id: "e1".into() }, t0)
        .unwrap();

    let table = chart.table();
    assert_eq!(table.len(), 1);
    let e2 = table.get("e2").unwrap();
    assert!(e2.is_root());
    assert_eq!(projection::organization_tree(table).unwrap().employee.id.as_str(), "e2");
}

#[test]
fn deleting_a_middle_manager_hands_reports_up() {
    let store = MemoryStore::new();
    let t0 = Instant::now();
    let mut chart = open(&store, t0);
    add(&mut chart, "ceo", None, t0);
    add(&mut chart, "vp", Some("ceo"), t0);
    for id in ["a", "b", "c"] {
        add(&mut chart, id, Some("vp"), t0);
    }

    chart
        .dispatch(Command::DeleteEmployee { id: "vp".into() }, t0)
        .unwrap();

    let ceo = chart.table().get("ceo").unwrap();
    let reports: Vec<&str> = ceo.direct_reports.iter().map(EmployeeId::as_str).collect();
    assert_eq!(reports, vec!["a", "b", "c"]);
    assert!(chart.table().violations().is_empty());
}

#[test]
fn moving_a_manager_under_its_report_is_rejected() {
    let store = MemoryStore::new();
    let t0 = Instant::now();
    let mut chart = open(&store, t0);
    add(&mut chart, "e1", None, t0);
    add(&mut chart, "e2", Some("e1"), t0);
    let version = chart.table().version();

    let err = chart
        .dispatch(
            Command::ChangeReportingLine {
                id: "e1".into(),
                manager: Some("e2".into()),
            },
            t0,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        CommandError::Hierarchy(HierarchyError::CyclicReference { .. })
    ));
    assert_eq!(chart.table().version(), version);
    assert!(chart.table().get("e1").unwrap().manager_id.is_none());
}

#[test]
fn toggling_a_bookmark_twice_leaves_none() {
    let store = MemoryStore::new();
    let t0 = Instant::now();
    let mut chart = open(&store, t0);
    add(&mut chart, "e1", None, t0);
    for expected in [true, false] {
        let outcome = chart
            .dispatch(Command::ToggleBookmark { key: "e1".into() }, t0)
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Bookmarked(expected));
    }
    assert!(chart.bookmarks().is_empty());
    assert!(open(&store, t0).bookmarks().is_empty());
}

#[test]
fn burst_of_edits_produces_one_save_with_the_latest_state() {
    let store = MemoryStore::new();
    let t0 = Instant::now();
    let mut chart = open(&store, t0);
    let writes_before = store.set_count();

    for (i, id) in ["a", "b", "c", "d"].into_iter().enumerate() {
        let now = t0 + Duration::from_millis(200 * u64::try_from(i).unwrap());
        add(&mut chart, id, None, now);
        chart.tick(now);
    }
    assert_eq!(store.set_count(), writes_before);

    chart.tick(t0 + Duration::from_millis(1_700));
    // orgChart, orgChartLastModified, orgChart_modified
    assert_eq!(store.set_count(), writes_before + 3);
    assert_eq!(open(&store, t0).table().len(), 4);
}

#[test]
fn unlisted_entry_is_recovered_on_open() {
    let store = MemoryStore::new();
    let t0 = Instant::now();
    let mut chart = open(&store, t0);
    add(&mut chart, "e1", None, t0);
    add(&mut chart, "e2", Some("e1"), t0);
    chart.dispatch(Command::PersistEmployees, t0).unwrap();

    let mut value: serde_json::Value =
        serde_json::from_str(&store.get(ORG_CHART_KEY).unwrap().unwrap()).unwrap();
    value["data"]["allIds"] = serde_json::json!(["e1"]);
    store.set(ORG_CHART_KEY, &value.to_string()).unwrap();

    let reopened = open(&store, t0);
    let ids: Vec<&str> = reopened.table().all_ids().iter().map(EmployeeId::as_str).collect();
    assert_eq!(ids, vec!["e1", "e2"]);
    assert!(!reopened.notices(t0).is_empty());

    let stored: Envelope<serde_json::Value> =
        serde_json::from_str(&store.get(ORG_CHART_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored.version, SCHEMA_VERSION);
    assert_eq!(stored.data["allIds"], serde_json::json!(["e1", "e2"]));
}

#[test]
fn explicit_load_replaces_memory_with_storage() {
    let store = MemoryStore::new();
    let t0 = Instant::now();
    let mut writer = open(&store, t0);
    add(&mut writer, "e1", None, t0);
    writer.flush().unwrap();

    let mut reader = open(&store, t0);
    add(&mut writer, "e2", Some("e1"), t0);
    writer.flush().unwrap();

    let outcome = reader.dispatch(Command::LoadEmployees, t0).unwrap();
    assert_eq!(
        outcome,
        CommandOutcome::Loaded {
            employees: 2,
            recovered: false
        }
    );
}
