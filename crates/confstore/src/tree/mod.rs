//! Persistent configuration tree.
//!
//! # Overview
//!
//! A configuration snapshot is an immutable [`Node`] behind an [`Arc`].
//! Nodes are never mutated once shared: an edit builds new nodes along the
//! path from the edited node up to the root and reuses every other subtree
//! as-is (structural sharing). Two snapshots can therefore be compared
//! cheaply with [`Arc::ptr_eq`] on any subtree the edit did not touch.
//!
//! Conversion to and from [`serde_json::Value`] is lossless; member order
//! is preserved.

pub mod edit;

pub use edit::{find_entry, goto, put, replace_at};

use std::fmt;
use std::sync::Arc;

use confstore_path::KeyTuple;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Shared, reference-counted tree node.
pub type NodeRef = Arc<Node>;

/// Ordered mapping of member names to nodes.
pub type Members = IndexMap<String, NodeRef>;

/// One node of a configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Ordered mapping with unique member names.
    Object(Members),
    /// Ordered sequence (list or leaf-list entries).
    Array(Vec<NodeRef>),
    /// Scalar value: string, number, boolean or null.
    Leaf(Value),
}

/// Structural kind of a [`Node`], used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Object,
    Array,
    Leaf,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeKind::Object => "object",
            NodeKind::Array => "array",
            NodeKind::Leaf => "leaf",
        })
    }
}

impl Node {
    /// A new empty object node.
    pub fn empty() -> NodeRef {
        Arc::new(Node::Object(Members::new()))
    }

    pub fn leaf(value: impl Into<Value>) -> NodeRef {
        Arc::new(Node::Leaf(value.into()))
    }

    /// Build a tree from a JSON value without any schema checks.
    pub fn from_value(value: &Value) -> NodeRef {
        Arc::new(match value {
            Value::Object(map) => Node::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Node::from_value(v)))
                    .collect(),
            ),
            Value::Array(items) => Node::Array(items.iter().map(Node::from_value).collect()),
            scalar => Node::Leaf(scalar.clone()),
        })
    }

    /// Render the subtree as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Object(members) => {
                let mut map = Map::with_capacity(members.len());
                for (k, v) in members {
                    map.insert(k.clone(), v.to_value());
                }
                Value::Object(map)
            }
            Node::Array(items) => Value::Array(items.iter().map(|n| n.to_value()).collect()),
            Node::Leaf(v) => v.clone(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Object(_) => NodeKind::Object,
            Node::Array(_) => NodeKind::Array,
            Node::Leaf(_) => NodeKind::Leaf,
        }
    }

    pub fn as_object(&self) -> Option<&Members> {
        match self {
            Node::Object(members) => Some(members),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[NodeRef]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            Node::Leaf(v) => Some(v),
            _ => None,
        }
    }

    /// Member of an object node.
    pub fn member(&self, name: &str) -> Option<&NodeRef> {
        self.as_object().and_then(|m| m.get(name))
    }

    /// Key tuple of a list entry, `None` if any key leaf is missing.
    ///
    /// A bare leaf (leaf-list entry) yields a one-element tuple of its value.
    pub fn key_tuple(&self, keys: &[String]) -> Option<KeyTuple> {
        match self {
            Node::Object(members) => keys
                .iter()
                .map(|k| members.get(k).and_then(|n| n.as_leaf()).map(key_string))
                .collect::<Option<Vec<_>>>()
                .map(KeyTuple),
            Node::Leaf(v) => Some(KeyTuple(vec![key_string(v)])),
            Node::Array(_) => None,
        }
    }
}

/// Canonical string form of a scalar, used for key comparison.
///
/// ```
/// use confstore::tree::key_string;
/// use serde_json::json;
///
/// assert_eq!(key_string(&json!("a")), "a");
/// assert_eq!(key_string(&json!(53)), "53");
/// assert_eq!(key_string(&json!(true)), "true");
/// ```
pub fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
