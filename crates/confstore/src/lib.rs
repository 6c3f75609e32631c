//! Schema-governed configuration datastore.
//!
//! A [`Datastore`] holds one immutable configuration tree and applies
//! create/read/update/delete/invoke requests ([`Rpc`]) to it:
//!
//! - paths are resolved to [`Address`]es through the [`SchemaModel`]
//! - every request passes the [`AccessGate`] first
//! - the [`engine`] computes a new root by path copying and the datastore
//!   publishes it atomically
//! - listeners registered by schema path are notified after the commit
//! - the [`LockManager`] serializes persistence
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use confstore::{Datastore, Rpc, SchemaTree};
//! use serde_json::json;
//!
//! let schema = SchemaTree::from_json_str(r#"{"children": [
//!     {"kind": "container", "name": "system", "children": [
//!         {"kind": "leaf", "name": "hostname", "type": "string"}]}]}"#).unwrap();
//! let ds = Datastore::new(Arc::new(schema));
//!
//! ds.create_node_rpc(&Rpc::new("admin").path("/").input(json!({"system": {}}))).unwrap();
//! ds.create_node_rpc(&Rpc::new("admin").path("/system").input(json!({"hostname": "ns1"}))).unwrap();
//!
//! let node = ds.get_node_rpc(&Rpc::new("admin").path("/system/hostname")).unwrap();
//! assert_eq!(node.to_value(), json!("ns1"));
//! ```

pub mod config;
pub mod datastore;
pub mod engine;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod lock;
pub mod notify;
pub mod persist;
pub mod policy;
pub mod resolve;
pub mod rpc;
pub mod schema;
pub mod tree;

pub mod cli;

pub use confstore_path::{Address, KeyTuple, PathFormat, Selector};
pub use config::{ConfigError, DatastoreConfig};
pub use datastore::{Datastore, DatastoreBuilder};
pub use engine::InsertMode;
pub use error::{DatastoreError, Result};
pub use gate::AccessGate;
pub use handlers::{OpHandler, OpHandlers, StateProvider, StateProviders};
pub use lock::LockManager;
pub use notify::{ChangeNotifier, DataListener};
pub use policy::{Action, Permission, PolicyConfig, PolicyEngine, RulePolicy, UserPolicy};
pub use resolve::PathResolver;
pub use rpc::Rpc;
pub use schema::{SchemaError, SchemaModel, SchemaNode, SchemaTree};
pub use tree::{Node, NodeRef};
