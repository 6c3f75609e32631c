//! Schema model service.
//!
//! The datastore never interprets a schema language itself. Everything it
//! needs from the schema goes through the [`SchemaModel`] trait: path
//! resolution, schema node lookup, state-bearing subtree discovery and
//! raw-to-typed conversion with validation.
//!
//! [`SchemaTree`] is the bundled implementation, loaded from a declarative
//! JSON or TOML description (see [`def`]).

pub mod convert;
pub mod def;
pub mod tree;

pub use def::{BaseType, NodeDef, OperationDef, SchemaDef};
pub use tree::SchemaTree;

use std::sync::Arc;

use confstore_path::{Address, KeyTuple, PathError, PathFormat};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::tree::{key_string, Node, NodeRef};

// ── Error ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("nonexistent schema node: {0}")]
    NonexistentSchemaNode(String),
    #[error("{path}: invalid selector: {reason}")]
    InvalidSelector { path: String, reason: String },
    #[error("{path}: unknown member \"{member}\"")]
    UnknownMember { path: String, member: String },
    #[error("{path}: expected {expected}, found {found}")]
    TypeError { path: String, expected: String, found: String },
    #[error("{path}: {reason}")]
    InvalidValue { path: String, reason: String },
    #[error("{path}: missing key \"{key}\"")]
    MissingKey { path: String, key: String },
    #[error("{path}: duplicate entry {key}")]
    DuplicateKey { path: String, key: String },
    #[error("invalid schema definition: {0}")]
    Definition(String),
}

// ── Schema nodes ──────────────────────────────────────────────────────────

/// Leaf value type with its restrictions.
#[derive(Debug, Clone)]
pub struct LeafType {
    pub base: BaseType,
    pub pattern: Option<Regex>,
    pub enums: Vec<String>,
}

impl LeafType {
    pub fn new(base: BaseType) -> Self {
        Self { base, pattern: None, enums: Vec::new() }
    }
}

/// Structural role of a schema node.
#[derive(Debug, Clone)]
pub enum SchemaNodeKind {
    /// The document root.
    Root,
    Container,
    /// Ordered collection of entries identified by `keys`.
    List { keys: Vec<String> },
    Leaf { ty: LeafType },
    /// Ordered collection of unique scalars.
    LeafList { ty: LeafType },
}

impl SchemaNodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            SchemaNodeKind::Root => "root",
            SchemaNodeKind::Container => "container",
            SchemaNodeKind::List { .. } => "list",
            SchemaNodeKind::Leaf { .. } => "leaf",
            SchemaNodeKind::LeafList { .. } => "leaf-list",
        }
    }
}

/// One node of the schema.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    /// Member name in the data tree (empty for the root).
    pub name: String,
    /// Canonical schema path, `/` for the root.
    pub path: String,
    pub kind: SchemaNodeKind,
    /// Values of this subtree come from a live state provider.
    pub state: bool,
    pub children: IndexMap<String, Arc<SchemaNode>>,
}

impl SchemaNode {
    pub fn child(&self, name: &str) -> Option<&Arc<SchemaNode>> {
        self.children.get(name)
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, SchemaNodeKind::List { .. })
    }

    pub fn is_leaf_list(&self) -> bool {
        matches!(self.kind, SchemaNodeKind::LeafList { .. })
    }

    /// List keys; empty for every other kind.
    pub fn keys(&self) -> &[String] {
        match &self.kind {
            SchemaNodeKind::List { keys } => keys,
            _ => &[],
        }
    }

    /// Type of the leaf identifying an entry: the key leaf `key` of a
    /// list, or the leaf-list itself for `.`.
    fn key_type(&self, key: &str) -> Option<&LeafType> {
        match (&self.kind, key) {
            (SchemaNodeKind::LeafList { ty }, ".") => Some(ty),
            (SchemaNodeKind::List { .. }, key) => match &self.child(key)?.kind {
                SchemaNodeKind::Leaf { ty } => Some(ty),
                _ => None,
            },
            _ => None,
        }
    }

    /// Canonical form of a textual key value, as stored entries compare it.
    ///
    /// `053` and `+53` for an integer key both become `53`.
    ///
    /// # Errors
    ///
    /// [`SchemaError::InvalidSelector`] if `key` names no key leaf or the
    /// value is not valid for its type.
    pub fn canonical_key(&self, key: &str, raw: &str) -> Result<String, SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidSelector { path: self.path.clone(), reason };
        let ty = self
            .key_type(key)
            .ok_or_else(|| invalid(format!("\"{key}\" is not a key")))?;
        let value = match (ty.base, raw) {
            (BaseType::Boolean, "true") => Value::Bool(true),
            (BaseType::Boolean, "false") => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        };
        let converted = convert::convert_leaf(ty, &value, &self.path)
            .map_err(|e| invalid(format!("key \"{key}\": {e}")))?;
        Ok(key_string(&converted))
    }

    /// Canonical key tuple of a list entry given as textual values in key
    /// order.
    pub fn canonical_tuple(&self, values: &KeyTuple) -> Result<KeyTuple, SchemaError> {
        let keys = self.keys();
        if keys.len() != values.len() {
            return Err(SchemaError::InvalidSelector {
                path: self.path.clone(),
                reason: format!("expected {} key value(s), got {}", keys.len(), values.len()),
            });
        }
        let canonical = keys
            .iter()
            .zip(values.values())
            .map(|(key, raw)| self.canonical_key(key, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(KeyTuple::new(canonical))
    }
}

// ── Service trait ─────────────────────────────────────────────────────────

/// Everything the datastore consumes from the schema.
pub trait SchemaModel: Send + Sync {
    /// Resolve a path expression into an [`Address`].
    ///
    /// Deterministic and side-effect free; fails if any step has no schema
    /// node.
    fn resolve_path(&self, expr: &str, format: PathFormat) -> Result<Address, SchemaError>;

    /// Schema node by canonical schema path.
    fn schema_node(&self, schema_path: &str) -> Option<Arc<SchemaNode>>;

    /// Schema node governing the data node at `addr`.
    fn schema_node_at(&self, addr: &Address) -> Option<Arc<SchemaNode>> {
        self.schema_node(&addr.schema_path())
    }

    /// Canonical paths of the state-bearing subtrees a read at `addr` must
    /// refresh.
    fn state_roots(&self, addr: &Address) -> Vec<String>;

    /// Convert a raw value into a validated tree anchored at `addr`.
    ///
    /// When `addr` ends in an entry selector, `raw` is a single entry.
    fn from_raw(&self, addr: &Address, raw: &Value) -> Result<NodeRef, SchemaError>;

    /// Raw encoding of a whole subtree.
    fn to_raw(&self, node: &Node) -> Value {
        node.to_value()
    }

    /// Convert the input arguments of a named operation.
    fn convert_op_input(&self, op_name: &str, raw: &Value) -> Result<Value, SchemaError>;
}
