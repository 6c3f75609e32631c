//! Tree mutation engine.
//!
//! Pure functions from `(root, address, arguments)` to a new root or a typed
//! failure. The input root is never modified; unchanged subtrees are shared
//! between the input and the result.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use confstore_path::{Address, KeyTuple, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DatastoreError, Result};
use crate::handlers::{OpHandlers, StateProviders};
use crate::schema::{SchemaModel, SchemaNodeKind};
use crate::tree::{find_entry, goto, replace_at, Node, NodeRef};

// ── Arguments ─────────────────────────────────────────────────────────────

/// Where a new entry goes in an ordered collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertMode {
    First,
    Last,
    /// Immediately before the entry named by the point.
    Before,
    /// Immediately after the entry named by the point.
    After,
}

impl InsertMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsertMode::First => "first",
            InsertMode::Last => "last",
            InsertMode::Before => "before",
            InsertMode::After => "after",
        }
    }

    fn needs_point(&self) -> bool {
        matches!(self, InsertMode::Before | InsertMode::After)
    }
}

impl fmt::Display for InsertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InsertMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(InsertMode::First),
            "last" => Ok(InsertMode::Last),
            "before" => Ok(InsertMode::Before),
            "after" => Ok(InsertMode::After),
            other => Err(format!("unknown insert mode \"{other}\"")),
        }
    }
}

/// Result of a committed-to-be edit.
#[derive(Debug, Clone)]
pub struct Edit {
    pub root: NodeRef,
    /// Address listeners are notified for; `None` for deletes.
    pub changed: Option<Address>,
}

// ── Read ──────────────────────────────────────────────────────────────────

/// The node at `addr`.
pub fn read(root: &NodeRef, addr: &Address) -> Result<NodeRef> {
    goto(root, addr).ok_or_else(|| DatastoreError::NotFound(addr.to_string()))
}

/// Let the providers of every state-bearing subtree relevant to `addr`
/// refresh `root`.
///
/// Returns `None` when nothing below `addr` is state-bearing.
///
/// # Errors
///
/// [`DatastoreError::NoStateHandler`] if a state-bearing subtree has no
/// provider; any provider failure.
pub fn merge_state(
    schema: &dyn SchemaModel,
    providers: &StateProviders,
    root: &NodeRef,
    addr: &Address,
) -> Result<Option<NodeRef>> {
    let state_roots = schema.state_roots(addr);
    if state_roots.is_empty() {
        return Ok(None);
    }
    let mut merged = Arc::clone(root);
    for path in state_roots {
        let provider = providers.get(&path).ok_or(DatastoreError::NoStateHandler(path))?;
        merged = provider.update_node(addr, merged)?;
    }
    Ok(Some(merged))
}

// ── Create ────────────────────────────────────────────────────────────────

/// Add the single member carried by `payload` to the object at `addr`.
///
/// An absent member is created. A present list or leaf-list member gets
/// one new entry positioned by `insert` and `point`.
pub fn create(
    schema: &dyn SchemaModel,
    root: &NodeRef,
    addr: &Address,
    payload: &Value,
    insert: Option<InsertMode>,
    point: Option<&KeyTuple>,
) -> Result<Edit> {
    let (name, value) = match payload {
        Value::Object(map) if map.len() == 1 => map.iter().next().ok_or_else(|| {
            DatastoreError::InvalidPayload("expected a single member".to_string())
        })?,
        _ => {
            return Err(DatastoreError::InvalidPayload(
                "create payload must be an object with exactly one member".to_string(),
            ))
        }
    };

    let target = read(root, addr)?;
    let Node::Object(members) = &*target else {
        return Err(DatastoreError::TypeMismatch(format!(
            "cannot add member \"{name}\" to {} at {addr}",
            target.kind()
        )));
    };
    let member_addr = addr.member(name.as_str());

    let new_root = match members.get(name).map(|m| &**m) {
        None => {
            let node = new_member(schema, &member_addr, value)?;
            replace_at(root, addr, |parent| match &**parent {
                Node::Object(members) => {
                    let mut members = members.clone();
                    members.insert(name.clone(), node);
                    Ok(Arc::new(Node::Object(members)))
                }
                other => Err(DatastoreError::TypeMismatch(format!("{} at {addr}", other.kind()))),
            })?
        }
        Some(Node::Array(items)) => {
            let (position, entry) = new_entry(schema, &member_addr, items, value, insert, point)?;
            replace_at(root, &member_addr, |array| match &**array {
                Node::Array(items) => {
                    let mut items = items.clone();
                    items.insert(position, entry);
                    Ok(Arc::new(Node::Array(items)))
                }
                other => Err(DatastoreError::TypeMismatch(format!("{} at {member_addr}", other.kind()))),
            })?
        }
        Some(_) => return Err(DatastoreError::DuplicateEntry(member_addr.to_string())),
    };

    Ok(Edit { root: new_root, changed: Some(member_addr) })
}

/// Convert the value of an absent member. A single entry given for a list
/// or leaf-list starts a one-entry collection.
fn new_member(schema: &dyn SchemaModel, member_addr: &Address, value: &Value) -> Result<NodeRef> {
    let collection = schema
        .schema_node_at(member_addr)
        .is_some_and(|n| n.is_list() || n.is_leaf_list());
    if collection && !value.is_array() {
        let entry = schema.from_raw(&member_addr.join(Selector::Index(0)), value)?;
        return Ok(Arc::new(Node::Array(vec![entry])));
    }
    Ok(schema.from_raw(member_addr, value)?)
}

/// Convert a new entry, check it against the existing `items` and find its
/// index.
fn new_entry(
    schema: &dyn SchemaModel,
    array_addr: &Address,
    items: &[NodeRef],
    value: &Value,
    insert: Option<InsertMode>,
    point: Option<&KeyTuple>,
) -> Result<(usize, NodeRef)> {
    let schema_node = schema
        .schema_node_at(array_addr)
        .ok_or_else(|| DatastoreError::InvalidPath(array_addr.schema_path()))?;
    let keys: &[String] = match &schema_node.kind {
        SchemaNodeKind::List { keys } => keys,
        SchemaNodeKind::LeafList { .. } => {
            if insert.is_some_and(|m| m.needs_point()) {
                return Err(DatastoreError::TypeMismatch(format!(
                    "leaf-list {array_addr} supports only first and last insertion"
                )));
            }
            &[]
        }
        other => {
            return Err(DatastoreError::TypeMismatch(format!(
                "{array_addr} is a {}, not a list or leaf-list",
                other.name()
            )))
        }
    };

    let entry = schema.from_raw(&array_addr.join(Selector::Index(items.len())), value)?;
    let tuple = entry
        .key_tuple(keys)
        .ok_or_else(|| DatastoreError::InvalidPayload(format!("entry of {array_addr} lacks its keys")))?;
    if items.iter().any(|item| item.key_tuple(keys).as_ref() == Some(&tuple)) {
        return Err(DatastoreError::DuplicateEntry(format!("{array_addr} entry {tuple}")));
    }

    let position = match insert.unwrap_or(InsertMode::Last) {
        InsertMode::First => 0,
        InsertMode::Last => items.len(),
        mode => {
            let point = point.ok_or_else(|| {
                DatastoreError::InvalidPayload(format!("insert \"{mode}\" requires a point"))
            })?;
            let point = schema_node
                .canonical_tuple(point)
                .map_err(|e| DatastoreError::InvalidPayload(format!("point {point}: {e}")))?;
            let at = items
                .iter()
                .position(|item| item.key_tuple(keys).as_ref() == Some(&point))
                .ok_or_else(|| DatastoreError::NotFound(format!("{array_addr} entry {point}")))?;
            if mode == InsertMode::Before {
                at
            } else {
                at + 1
            }
        }
    };
    Ok((position, entry))
}

// ── Update ────────────────────────────────────────────────────────────────

/// Replace the whole subtree at `addr` with `payload`.
pub fn update(schema: &dyn SchemaModel, root: &NodeRef, addr: &Address, payload: &Value) -> Result<Edit> {
    read(root, addr)?;
    let node = schema.from_raw(addr, payload)?;

    if let Some(last) = addr.last().filter(|s| s.is_entry()) {
        let array_addr = addr.parent()?;
        let keys = schema.schema_node_at(&array_addr).map(|n| n.keys().to_vec()).unwrap_or_default();
        let tuple = node
            .key_tuple(&keys)
            .ok_or_else(|| DatastoreError::InvalidPayload(format!("entry {addr} lacks its keys")))?;

        if let (Selector::Keys(_), false) = (last, keys.is_empty()) {
            if last.key_tuple().as_ref() != Some(&tuple) {
                return Err(DatastoreError::InvalidPayload(format!(
                    "entry {addr} cannot change its keys to {tuple}"
                )));
            }
        }

        let array = read(root, &array_addr)?;
        if let Some(items) = array.as_array() {
            let replaced = match last {
                Selector::Index(idx) => Some(*idx),
                Selector::Keys(pairs) => find_entry(items, pairs),
                Selector::Member(_) => None,
            };
            let clash = items
                .iter()
                .enumerate()
                .any(|(i, item)| Some(i) != replaced && item.key_tuple(&keys).as_ref() == Some(&tuple));
            if clash {
                return Err(DatastoreError::DuplicateEntry(format!("{array_addr} entry {tuple}")));
            }
        }
    }

    let new_root = replace_at(root, addr, |_| Ok(node))?;
    Ok(Edit { root: new_root, changed: Some(addr.clone()) })
}

// ── Delete ────────────────────────────────────────────────────────────────

/// Remove the node at `addr` from its parent.
pub fn delete(root: &NodeRef, addr: &Address) -> Result<Edit> {
    let Some(last) = addr.last() else {
        return Err(DatastoreError::TypeMismatch("the root cannot be deleted".to_string()));
    };
    read(root, addr)?;
    let parent = addr.parent()?;

    let new_root = replace_at(root, &parent, |node| match (&**node, last) {
        (Node::Array(items), Selector::Index(_) | Selector::Keys(_)) => {
            let idx = match last {
                Selector::Keys(pairs) => find_entry(items, pairs),
                Selector::Index(idx) => Some(*idx).filter(|i| *i < items.len()),
                Selector::Member(_) => None,
            }
            .ok_or_else(|| DatastoreError::NotFound(addr.to_string()))?;
            let mut items = items.clone();
            items.remove(idx);
            Ok(Arc::new(Node::Array(items)))
        }
        (Node::Object(members), Selector::Member(name)) => {
            let mut members = members.clone();
            members.shift_remove(name);
            Ok(Arc::new(Node::Object(members)))
        }
        (node, selector) => Err(DatastoreError::TypeMismatch(format!(
            "cannot remove {selector} from {} at {parent}",
            node.kind()
        ))),
    })?;

    Ok(Edit { root: new_root, changed: None })
}

// ── Invoke ────────────────────────────────────────────────────────────────

/// Run the handler registered for `op_name` on `input`.
pub fn invoke(schema: &dyn SchemaModel, handlers: &OpHandlers, op_name: &str, input: &Value) -> Result<Value> {
    let handler = handlers
        .get(op_name)
        .ok_or_else(|| DatastoreError::NoHandler(op_name.to_string()))?;
    let input = schema.convert_op_input(op_name, input)?;
    handler.call(&input)
}
