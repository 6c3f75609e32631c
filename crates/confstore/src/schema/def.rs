//! Declarative schema description and its compilation into [`SchemaNode`]s.
//!
//! A description is a list of top-level data nodes plus optional operation
//! definitions:
//!
//! ```json
//! {
//!   "children": [
//!     {"kind": "container", "name": "dns:server", "children": [
//!       {"kind": "list", "name": "zone", "keys": ["domain"], "children": [
//!         {"kind": "leaf", "name": "domain", "type": "string"},
//!         {"kind": "leaf-list", "name": "masters", "type": "string"}
//!       ]}
//!     ]}
//!   ],
//!   "operations": [
//!     {"name": "dns:reload", "input": [{"kind": "leaf", "name": "zone", "type": "string"}]}
//!   ]
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use confstore_path::is_valid_name;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{LeafType, SchemaError, SchemaNode, SchemaNodeKind};

/// Built-in leaf base types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaseType {
    String,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Decimal64,
    Boolean,
    Enumeration,
}

impl BaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseType::String => "string",
            BaseType::Int8 => "int8",
            BaseType::Int16 => "int16",
            BaseType::Int32 => "int32",
            BaseType::Int64 => "int64",
            BaseType::Uint8 => "uint8",
            BaseType::Uint16 => "uint16",
            BaseType::Uint32 => "uint32",
            BaseType::Uint64 => "uint64",
            BaseType::Decimal64 => "decimal64",
            BaseType::Boolean => "boolean",
            BaseType::Enumeration => "enumeration",
        }
    }

    /// Inclusive bounds of integer types.
    pub fn int_bounds(&self) -> Option<(i128, i128)> {
        Some(match self {
            BaseType::Int8 => (i8::MIN.into(), i8::MAX.into()),
            BaseType::Int16 => (i16::MIN.into(), i16::MAX.into()),
            BaseType::Int32 => (i32::MIN.into(), i32::MAX.into()),
            BaseType::Int64 => (i64::MIN.into(), i64::MAX.into()),
            BaseType::Uint8 => (0, u8::MAX.into()),
            BaseType::Uint16 => (0, u16::MAX.into()),
            BaseType::Uint32 => (0, u32::MAX.into()),
            BaseType::Uint64 => (0, u64::MAX.into()),
            _ => return None,
        })
    }
}

/// One data node of a schema description.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NodeDef {
    Container {
        name: String,
        #[serde(default)]
        state: bool,
        #[serde(default)]
        children: Vec<NodeDef>,
    },
    List {
        name: String,
        keys: Vec<String>,
        #[serde(default)]
        state: bool,
        #[serde(default)]
        children: Vec<NodeDef>,
    },
    Leaf {
        name: String,
        #[serde(rename = "type")]
        ty: BaseType,
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default, rename = "enum")]
        enums: Vec<String>,
        #[serde(default)]
        state: bool,
    },
    LeafList {
        name: String,
        #[serde(rename = "type")]
        ty: BaseType,
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default, rename = "enum")]
        enums: Vec<String>,
        #[serde(default)]
        state: bool,
    },
}

impl NodeDef {
    pub fn name(&self) -> &str {
        match self {
            NodeDef::Container { name, .. }
            | NodeDef::List { name, .. }
            | NodeDef::Leaf { name, .. }
            | NodeDef::LeafList { name, .. } => name,
        }
    }
}

/// A named operation and the shape of its input.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationDef {
    pub name: String,
    #[serde(default)]
    pub input: Vec<NodeDef>,
}

/// Whole schema description.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaDef {
    #[serde(default)]
    pub children: Vec<NodeDef>,
    #[serde(default)]
    pub operations: Vec<OperationDef>,
}

// ── Compilation ───────────────────────────────────────────────────────────

pub(crate) type PathIndex = HashMap<String, Arc<SchemaNode>>;

fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn leaf_type(
    base: BaseType,
    pattern: Option<&str>,
    enums: &[String],
    path: &str,
) -> Result<LeafType, SchemaError> {
    if base == BaseType::Enumeration && enums.is_empty() {
        return Err(SchemaError::Definition(format!("{path}: enumeration without values")));
    }
    let pattern = match pattern {
        // Patterns always match the whole value.
        Some(p) => Some(
            Regex::new(&format!("^(?:{p})$"))
                .map_err(|e| SchemaError::Definition(format!("{path}: {e}")))?,
        ),
        None => None,
    };
    Ok(LeafType { base, pattern, enums: enums.to_vec() })
}

pub(crate) fn compile_children(
    defs: &[NodeDef],
    parent_path: &str,
    index: &mut PathIndex,
) -> Result<IndexMap<String, Arc<SchemaNode>>, SchemaError> {
    let mut children = IndexMap::with_capacity(defs.len());
    for def in defs {
        let node = compile_node(def, parent_path, index)?;
        if children.insert(node.name.clone(), node).is_some() {
            return Err(SchemaError::Definition(format!(
                "{parent_path}: duplicate child \"{}\"",
                def.name()
            )));
        }
    }
    Ok(children)
}

fn compile_node(
    def: &NodeDef,
    parent_path: &str,
    index: &mut PathIndex,
) -> Result<Arc<SchemaNode>, SchemaError> {
    let name = def.name();
    if !is_valid_name(name) {
        return Err(SchemaError::Definition(format!("{parent_path}: invalid name \"{name}\"")));
    }
    let path = join_path(parent_path, name);

    let (kind, state, children) = match def {
        NodeDef::Container { state, children, .. } => {
            (SchemaNodeKind::Container, *state, compile_children(children, &path, index)?)
        }
        NodeDef::List { keys, state, children, .. } => {
            let children = compile_children(children, &path, index)?;
            check_keys(keys, &children, &path)?;
            (SchemaNodeKind::List { keys: keys.clone() }, *state, children)
        }
        NodeDef::Leaf { ty, pattern, enums, state, .. } => {
            let ty = leaf_type(*ty, pattern.as_deref(), enums, &path)?;
            (SchemaNodeKind::Leaf { ty }, *state, IndexMap::new())
        }
        NodeDef::LeafList { ty, pattern, enums, state, .. } => {
            let ty = leaf_type(*ty, pattern.as_deref(), enums, &path)?;
            (SchemaNodeKind::LeafList { ty }, *state, IndexMap::new())
        }
    };

    let node = Arc::new(SchemaNode { name: name.to_string(), path: path.clone(), kind, state, children });
    index.insert(path, Arc::clone(&node));
    Ok(node)
}

fn check_keys(
    keys: &[String],
    children: &IndexMap<String, Arc<SchemaNode>>,
    path: &str,
) -> Result<(), SchemaError> {
    if keys.is_empty() {
        return Err(SchemaError::Definition(format!("{path}: list without keys")));
    }
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(SchemaError::Definition(format!("{path}: key \"{key}\" repeated")));
        }
        match children.get(key).map(|c| &c.kind) {
            Some(SchemaNodeKind::Leaf { .. }) => {}
            _ => {
                return Err(SchemaError::Definition(format!(
                    "{path}: key \"{key}\" is not a leaf child"
                )))
            }
        }
    }
    Ok(())
}
