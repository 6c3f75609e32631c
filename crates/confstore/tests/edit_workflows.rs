mod common;

use std::sync::Arc;

use common::{add_zones, addr, admin, datastore, node, zone_domains, ROOT};
use confstore::{DatastoreError, Selector};
use serde_json::json;

#[test]
fn delete_entry_by_key_keeps_order() {
    let ds = datastore();
    add_zones(&ds, &["a.com", "b.com", "c.com", "d.com"]);

    ds.delete_node_rpc(&admin().path(format!("{ROOT}/zones/zone=b.com"))).unwrap();
    assert_eq!(zone_domains(&ds), ["a.com", "c.com", "d.com"]);

    ds.delete_node_rpc(&admin().path(format!("{ROOT}/zones/zone[domain='d.com']")).xpath())
        .unwrap();
    assert_eq!(zone_domains(&ds), ["a.com", "c.com"]);
}

#[test]
fn delete_by_position() {
    let ds = datastore();
    add_zones(&ds, &["a.com", "b.com", "c.com"]);
    ds.delete_node_rpc(&admin().path(format!("{ROOT}/zones/zone[2]")).xpath()).unwrap();
    assert_eq!(zone_domains(&ds), ["a.com", "c.com"]);
}

#[test]
fn delete_missing_is_not_found() {
    let ds = datastore();
    add_zones(&ds, &["a.com"]);
    let before = ds.data_root();
    for path in [
        format!("{ROOT}/zones/zone=nope.com"),
        format!("{ROOT}/listen"),
        format!("{ROOT}/zones/zone=a.com/file"),
    ] {
        let err = ds.delete_node_rpc(&admin().path(&path)).unwrap_err();
        assert!(matches!(err, DatastoreError::NotFound(_)), "{path}: {err}");
    }
    assert!(Arc::ptr_eq(&before, &ds.data_root()));
}

#[test]
fn delete_member_and_leaf_list_value() {
    let ds = datastore();
    ds.update_node_rpc(
        &admin()
            .path(format!("{ROOT}/zones"))
            .input(json!({"zone": [{"domain": "a.com", "masters": ["m1", "m2", "m3"]}]})),
    )
    .unwrap();

    ds.delete_node_rpc(&admin().path(format!("{ROOT}/zones/zone=a.com/masters=m2"))).unwrap();
    assert_eq!(node(&ds, &format!("{ROOT}/zones/zone=a.com/masters")).to_value(), json!(["m1", "m3"]));

    ds.delete_node_rpc(&admin().path(format!("{ROOT}/server-options"))).unwrap();
    assert!(ds.data_root().to_value()[ROOT.trim_start_matches('/')].get("server-options").is_none());
}

#[test]
fn delete_root_is_type_mismatch() {
    let ds = datastore();
    let err = ds.delete_node_rpc(&admin().path("/")).unwrap_err();
    assert_eq!(err.kind(), "type-mismatch");
}

#[test]
fn update_replaces_without_merge() {
    let ds = datastore();
    ds.update_node_rpc(&admin().path(format!("{ROOT}/zones")).input(json!({
        "zone": [{"domain": "a.com", "file": "a.zone", "masters": ["m1"]}]
    })))
    .unwrap();

    ds.update_node_rpc(
        &admin()
            .path(format!("{ROOT}/zones/zone=a.com"))
            .input(json!({"domain": "a.com", "file": "new.zone"})),
    )
    .unwrap();
    assert_eq!(
        node(&ds, &format!("{ROOT}/zones/zone=a.com")).to_value(),
        json!({"domain": "a.com", "file": "new.zone"})
    );
}

#[test]
fn update_leaf_converts_value() {
    let ds = datastore();
    ds.update_node_rpc(&admin().path(format!("{ROOT}/server-options/workers")).input(json!("16")))
        .unwrap();
    assert_eq!(node(&ds, &format!("{ROOT}/server-options/workers")).to_value(), json!(16));

    let before = ds.data_root();
    let err = ds
        .update_node_rpc(&admin().path(format!("{ROOT}/server-options/workers")).input(json!(-1)))
        .unwrap_err();
    assert_eq!(err.kind(), "invalid-payload");
    assert!(Arc::ptr_eq(&before, &ds.data_root()));
}

#[test]
fn update_guards_entry_identity() {
    let ds = datastore();
    add_zones(&ds, &["a.com", "b.com"]);

    let err = ds
        .update_node_rpc(&admin().path(format!("{ROOT}/zones/zone=a.com")).input(json!({"domain": "z.com"})))
        .unwrap_err();
    assert_eq!(err.kind(), "invalid-payload");

    let err = ds
        .update_node_rpc(&admin().path(format!("{ROOT}/zones/zone[1]")).xpath().input(json!({"domain": "b.com"})))
        .unwrap_err();
    assert_eq!(err.kind(), "duplicate-entry");

    let err = ds
        .update_node_rpc(
            &admin()
                .path(format!("{ROOT}/zones/zone"))
                .input(json!([{"domain": "x"}, {"domain": "x"}])),
        )
        .unwrap_err();
    assert_eq!(err.kind(), "duplicate-entry");
    assert_eq!(zone_domains(&ds), ["a.com", "b.com"]);
}

#[test]
fn update_missing_is_not_found() {
    let ds = datastore();
    let err = ds
        .update_node_rpc(&admin().path(format!("{ROOT}/listen")).input(json!([])))
        .unwrap_err();
    assert_eq!(err.kind(), "not-found");
}

#[test]
fn pre_resolved_address() {
    let ds = datastore();
    add_zones(&ds, &["a.com"]);
    let target = addr(&ds, &format!("{ROOT}/zones/zone")).join(Selector::keys([("domain", "a.com")]));
    ds.update_node_rpc(&admin().address(target.clone()).input(json!({"domain": "a.com", "file": "f"})))
        .unwrap();
    assert_eq!(ds.get_node(&target.member("file")).unwrap().to_value(), json!("f"));
}
