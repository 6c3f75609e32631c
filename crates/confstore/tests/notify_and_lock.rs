mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{add_zones, admin, datastore, zone, ROOT};
use confstore::{Address, DatastoreError, SchemaNode};
use parking_lot::Mutex;
use serde_json::json;

type Log = Arc<Mutex<Vec<(String, String)>>>;

fn record(ds: &confstore::Datastore, path: &str, log: &Log) {
    let log = Arc::clone(log);
    let tag = path.to_string();
    ds.add_schema_listener(
        path,
        Arc::new(move |node: &SchemaNode, addr: &Address| {
            assert_eq!(node.path, tag);
            log.lock().push((tag.clone(), addr.to_string()));
        }),
    )
    .unwrap();
}

#[test]
fn nested_edit_notifies_child_to_root() {
    let ds = datastore();
    add_zones(&ds, &["a.com"]);
    let log: Log = Arc::default();

    for path in [
        "/",
        "/dns-server:dns-server",
        "/dns-server:dns-server/zones",
        "/dns-server:dns-server/zones/zone",
        "/dns-server:dns-server/zones/zone/query-module",
        "/dns-server:dns-server/server-options",
    ] {
        record(&ds, path, &log);
    }

    ds.create_node_rpc(
        &admin()
            .path(format!("{ROOT}/zones/zone=a.com"))
            .input(json!({"query-module": {"name": "geo", "type": "geoip"}})),
    )
    .unwrap();

    let levels: Vec<String> = log.lock().iter().map(|(level, _)| level.clone()).collect();
    assert_eq!(
        levels,
        [
            "/dns-server:dns-server/zones/zone/query-module",
            "/dns-server:dns-server/zones/zone",
            "/dns-server:dns-server/zones",
            "/dns-server:dns-server",
            "/",
        ]
    );
    let edited = "/dns-server:dns-server/zones/zone[domain='a.com']/query-module";
    assert!(log.lock().iter().all(|(_, addr)| addr == edited));
}

#[test]
fn update_notifies_delete_does_not() {
    let ds = datastore();
    add_zones(&ds, &["a.com"]);
    let log: Log = Arc::default();
    record(&ds, "/dns-server:dns-server/zones", &log);

    ds.update_node_rpc(&admin().path(format!("{ROOT}/zones/zone=a.com")).input(json!({"domain": "a.com"})))
        .unwrap();
    assert_eq!(log.lock().len(), 1);

    ds.delete_node_rpc(&admin().path(format!("{ROOT}/zones/zone=a.com"))).unwrap();
    assert_eq!(log.lock().len(), 1);
}

#[test]
fn failed_edit_does_not_notify() {
    let ds = datastore();
    add_zones(&ds, &["a.com"]);
    let log: Log = Arc::default();
    record(&ds, "/", &log);
    let err = ds.create_node_rpc(&admin().path(format!("{ROOT}/zones")).input(zone("a.com"))).unwrap_err();
    assert_eq!(err.kind(), "duplicate-entry");
    assert!(log.lock().is_empty());
}

#[test]
fn panicking_listener_keeps_commit() {
    let ds = datastore();
    ds.add_schema_listener(
        "/dns-server:dns-server/zones",
        Arc::new(|_: &SchemaNode, _: &Address| panic!("listener failure")),
    )
    .unwrap();
    ds.create_node_rpc(&admin().path(format!("{ROOT}/zones")).input(zone("a.com"))).unwrap();
    assert_eq!(common::zone_domains(&ds), ["a.com"]);
}

#[test]
fn listener_registration() {
    let ds = datastore();
    let err = ds
        .add_schema_listener("/dns-server:dns-server/nope", Arc::new(|_: &SchemaNode, _: &Address| {}))
        .unwrap_err();
    assert_eq!(err.kind(), "invalid-path");

    for _ in 0..2 {
        ds.add_schema_listener("dns-server:dns-server/zones/", Arc::new(|_: &SchemaNode, _: &Address| {}))
            .unwrap();
    }
    assert_eq!(ds.listeners_at("/dns-server:dns-server/zones"), 2);
}

#[test]
fn lock_busy_then_release() {
    let ds = datastore();
    ds.lock(Some("h1"), true, None).unwrap();

    match ds.lock(Some("h2"), false, None) {
        Err(DatastoreError::LockBusy { holder, .. }) => assert_eq!(holder, "h1"),
        other => panic!("expected LockBusy, got {other:?}"),
    }

    ds.unlock();
    ds.lock(Some("h2"), false, None).unwrap();
    assert_eq!(ds.lock_holder().as_deref(), Some("h2"));
    ds.unlock();
}

#[test]
fn save_waits_for_lock_then_times_out() {
    let ds = confstore::Datastore::builder(common::schema())
        .config(confstore::DatastoreConfig::from_toml_str("lock_timeout_ms = 30").unwrap())
        .build();
    ds.lock(Some("editor"), false, None).unwrap();
    let err = ds.save_to_writer(Vec::new()).unwrap_err();
    assert!(matches!(err, DatastoreError::LockBusy { ref holder, .. } if holder == "editor"));
    ds.unlock();
    ds.save_to_writer(Vec::new()).unwrap();
    assert!(ds.lock_holder().is_none());
}

#[test]
fn blocked_locker_gets_the_lock_after_release() {
    let ds = Arc::new(datastore());
    ds.lock(Some("first"), false, None).unwrap();

    let waiter = {
        let ds = Arc::clone(&ds);
        thread::spawn(move || ds.lock(Some("second"), true, Some(Duration::from_secs(5))))
    };
    thread::sleep(Duration::from_millis(20));
    ds.unlock();
    waiter.join().unwrap().unwrap();
    assert_eq!(ds.lock_holder().as_deref(), Some("second"));
}
