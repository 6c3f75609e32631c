//! Shared fixtures: a small DNS server schema and datastore helpers.

#![allow(dead_code)]

use std::sync::Arc;

use confstore::{Address, Datastore, DatastoreBuilder, NodeRef, PathFormat, Rpc, SchemaTree};
use serde_json::{json, Value};

pub const ROOT: &str = "/dns-server:dns-server";

pub const DNS_SCHEMA: &str = r#"{
    "children": [
        {"kind": "container", "name": "dns-server:dns-server", "children": [
            {"kind": "container", "name": "server-options", "children": [
                {"kind": "leaf", "name": "workers", "type": "uint16"}
            ]},
            {"kind": "container", "name": "zones", "children": [
                {"kind": "list", "name": "zone", "keys": ["domain"], "children": [
                    {"kind": "leaf", "name": "domain", "type": "string"},
                    {"kind": "leaf", "name": "file", "type": "string"},
                    {"kind": "leaf-list", "name": "masters", "type": "string"},
                    {"kind": "list", "name": "query-module", "keys": ["name"], "children": [
                        {"kind": "leaf", "name": "name", "type": "string"},
                        {"kind": "leaf", "name": "type", "type": "enumeration",
                         "enum": ["synth-record", "dnstap", "geoip"]}
                    ]},
                    {"kind": "leaf-list", "name": "access-control-list", "type": "string"}
                ]}
            ]},
            {"kind": "list", "name": "listen", "keys": ["address", "port"], "children": [
                {"kind": "leaf", "name": "address", "type": "string"},
                {"kind": "leaf", "name": "port", "type": "uint16"}
            ]},
            {"kind": "container", "name": "statistics", "state": true, "children": [
                {"kind": "leaf", "name": "queries", "type": "uint64"}
            ]}
        ]}
    ],
    "operations": [
        {"name": "dns-server:zone-reload", "input": [
            {"kind": "leaf", "name": "zone", "type": "string"}
        ]}
    ]
}"#;

pub fn schema() -> Arc<SchemaTree> {
    Arc::new(SchemaTree::from_json_str(DNS_SCHEMA).expect("fixture schema compiles"))
}

pub fn builder() -> DatastoreBuilder {
    Datastore::builder(schema())
}

/// Datastore holding the skeleton document.
pub fn datastore() -> Datastore {
    seeded(builder().build())
}

pub fn skeleton() -> Value {
    json!({
        "dns-server:dns-server": {
            "server-options": {"workers": 4},
            "zones": {}
        }
    })
}

pub fn seeded(ds: Datastore) -> Datastore {
    ds.load_value(&skeleton()).expect("skeleton loads");
    ds
}

pub fn admin() -> Rpc {
    Rpc::new("admin")
}

pub fn zone(domain: &str) -> Value {
    json!({"zone": {"domain": domain}})
}

/// Create zones one by one, appending.
pub fn add_zones(ds: &Datastore, domains: &[&str]) {
    for domain in domains {
        ds.create_node_rpc(&admin().path(format!("{ROOT}/zones")).input(zone(domain)))
            .expect("zone created");
    }
}

pub fn zone_domains(ds: &Datastore) -> Vec<String> {
    let zones = ds
        .get_node_path(&format!("{ROOT}/zones/zone"), PathFormat::Url)
        .expect("zone list exists");
    zones
        .to_value()
        .as_array()
        .expect("zone list is an array")
        .iter()
        .map(|z| z["domain"].as_str().unwrap_or_default().to_string())
        .collect()
}

pub fn addr(ds: &Datastore, path: &str) -> Address {
    ds.schema().resolve_path(path, PathFormat::Url).expect("path resolves")
}

pub fn node(ds: &Datastore, path: &str) -> NodeRef {
    ds.get_node_path(path, PathFormat::Url).expect("node exists")
}
