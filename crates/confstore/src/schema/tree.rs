//! [`SchemaTree`]: the bundled [`SchemaModel`] implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use confstore_path::{
    normalize_schema_path, parse_path, schema_parent, Address, KeyTuple, PathFormat, RawSelector,
    RawStep, Selector,
};
use indexmap::IndexMap;
use serde_json::Value;

use super::convert::convert_node;
use super::def::{compile_children, PathIndex, SchemaDef};
use super::{SchemaError, SchemaModel, SchemaNode, SchemaNodeKind};
use crate::tree::NodeRef;

/// Schema loaded from a [`SchemaDef`] description.
#[derive(Debug, Clone)]
pub struct SchemaTree {
    root: Arc<SchemaNode>,
    index: PathIndex,
    operations: HashMap<String, Arc<SchemaNode>>,
}

impl SchemaTree {
    /// Compile a description.
    ///
    /// # Errors
    ///
    /// [`SchemaError::Definition`] for invalid names, duplicate children,
    /// bad list keys or patterns.
    pub fn from_def(def: &SchemaDef) -> Result<Self, SchemaError> {
        let mut index = PathIndex::new();
        let children = compile_children(&def.children, "/", &mut index)?;
        let root = Arc::new(SchemaNode {
            name: String::new(),
            path: "/".to_string(),
            kind: SchemaNodeKind::Root,
            state: false,
            children,
        });
        index.insert("/".to_string(), Arc::clone(&root));

        let mut operations = HashMap::new();
        for op in &def.operations {
            let path = format!("/{}/input", op.name);
            // Operation inputs live outside the data tree index.
            let children = compile_children(&op.input, &path, &mut PathIndex::new())?;
            let input = Arc::new(SchemaNode {
                name: "input".to_string(),
                path,
                kind: SchemaNodeKind::Container,
                state: false,
                children,
            });
            if operations.insert(op.name.clone(), input).is_some() {
                return Err(SchemaError::Definition(format!("duplicate operation \"{}\"", op.name)));
            }
        }

        Ok(Self { root, index, operations })
    }

    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let def: SchemaDef =
            serde_json::from_str(json).map_err(|e| SchemaError::Definition(e.to_string()))?;
        Self::from_def(&def)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SchemaError> {
        let def: SchemaDef = toml::from_str(text).map_err(|e| SchemaError::Definition(e.to_string()))?;
        Self::from_def(&def)
    }

    /// Load a description file; `.toml` files are read as TOML, anything
    /// else as JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::Definition(format!("{}: {e}", path.display())))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            _ => Self::from_json_str(&text),
        }
    }

    pub fn root(&self) -> &Arc<SchemaNode> {
        &self.root
    }

    /// Input definition of a declared operation.
    pub fn operation(&self, name: &str) -> Option<&Arc<SchemaNode>> {
        self.operations.get(name)
    }

    /// Resolve already-parsed steps.
    pub fn resolve_steps(&self, steps: &[RawStep]) -> Result<Address, SchemaError> {
        let mut node = &self.root;
        let mut addr = Address::root();
        let total = steps.len();

        for (i, step) in steps.iter().enumerate() {
            let child = node.child(&step.name).ok_or_else(|| {
                SchemaError::NonexistentSchemaNode(addr.member(step.name.as_str()).schema_path())
            })?;
            addr.push(Selector::Member(step.name.clone()));

            let invalid = |reason: &str| SchemaError::InvalidSelector {
                path: child.path.clone(),
                reason: reason.to_string(),
            };
            let selector = match (&child.kind, &step.selector) {
                (_, None) => None,
                (SchemaNodeKind::List { keys }, Some(RawSelector::Values(values))) => {
                    let tuple = child.canonical_tuple(&KeyTuple::new(values.clone()))?;
                    Some(Selector::Keys(keys.iter().cloned().zip(tuple.0).collect()))
                }
                (SchemaNodeKind::List { keys }, Some(RawSelector::Keys(pairs))) => {
                    let ordered = order_keys(keys, pairs).map_err(|r| invalid(&r))?;
                    let canonical = ordered
                        .into_iter()
                        .map(|(key, raw)| {
                            let value = child.canonical_key(&key, &raw)?;
                            Ok((key, value))
                        })
                        .collect::<Result<Vec<_>, SchemaError>>()?;
                    Some(Selector::Keys(canonical))
                }
                (SchemaNodeKind::LeafList { .. }, Some(RawSelector::Values(values))) => {
                    let [value] = values.as_slice() else {
                        return Err(invalid("leaf-list entries take exactly one value"));
                    };
                    Some(Selector::Keys(vec![(".".to_string(), child.canonical_key(".", value)?)]))
                }
                (SchemaNodeKind::LeafList { .. }, Some(RawSelector::LeafValue(value))) => {
                    Some(Selector::Keys(vec![(".".to_string(), child.canonical_key(".", value)?)]))
                }
                (
                    SchemaNodeKind::List { .. } | SchemaNodeKind::LeafList { .. },
                    Some(RawSelector::Position(pos)),
                ) => Some(Selector::Index(pos - 1)),
                (SchemaNodeKind::List { .. }, Some(RawSelector::LeafValue(_))) => {
                    return Err(invalid("value predicate on a list"));
                }
                (SchemaNodeKind::LeafList { .. }, Some(RawSelector::Keys(_))) => {
                    return Err(invalid("key predicate on a leaf-list"));
                }
                (_, Some(_)) => return Err(invalid("selector on a non-list node")),
            };

            match selector {
                Some(selector) => addr.push(selector),
                None if i + 1 < total && (child.is_list() || child.is_leaf_list()) => {
                    return Err(invalid("entry must be selected before descending"));
                }
                None => {}
            }
            node = child;
        }
        Ok(addr)
    }
}

/// Reorder named key predicates into declared key order.
fn order_keys(keys: &[String], pairs: &[(String, String)]) -> Result<Vec<(String, String)>, String> {
    if let Some((unknown, _)) = pairs.iter().find(|(k, _)| !keys.contains(k)) {
        return Err(format!("\"{unknown}\" is not a key"));
    }
    let mut ordered = Vec::with_capacity(keys.len());
    for key in keys {
        let mut matching = pairs.iter().filter(|(k, _)| k == key);
        match (matching.next(), matching.next()) {
            (Some((_, v)), None) => ordered.push((key.clone(), v.clone())),
            (None, _) => return Err(format!("missing key \"{key}\"")),
            (Some(_), Some(_)) => return Err(format!("key \"{key}\" given twice")),
        }
    }
    Ok(ordered)
}

fn collect_state_roots(node: &SchemaNode, out: &mut Vec<String>) {
    for child in node.children.values() {
        if child.state {
            out.push(child.path.clone());
        } else {
            collect_state_roots(child, out);
        }
    }
}

impl SchemaModel for SchemaTree {
    fn resolve_path(&self, expr: &str, format: PathFormat) -> Result<Address, SchemaError> {
        let steps = parse_path(expr, format)?;
        self.resolve_steps(&steps)
    }

    fn schema_node(&self, schema_path: &str) -> Option<Arc<SchemaNode>> {
        match self.index.get(schema_path) {
            Some(node) => Some(Arc::clone(node)),
            None => self.index.get(&normalize_schema_path(schema_path)).cloned(),
        }
    }

    fn state_roots(&self, addr: &Address) -> Vec<String> {
        let path = addr.schema_path();
        let Some(node) = self.schema_node(&path) else {
            return Vec::new();
        };

        // Inside a state subtree, its topmost state ancestor owns the data.
        let mut topmost = node.state.then(|| path.clone());
        let mut cursor = schema_parent(&path);
        while let Some(p) = cursor {
            if self.index.get(p).is_some_and(|n| n.state) {
                topmost = Some(p.to_string());
            }
            cursor = schema_parent(p);
        }
        if let Some(root) = topmost {
            return vec![root];
        }

        let mut roots = Vec::new();
        collect_state_roots(&node, &mut roots);
        roots
    }

    fn from_raw(&self, addr: &Address, raw: &Value) -> Result<NodeRef, SchemaError> {
        let Some(schema) = self.schema_node_at(addr) else {
            if let (Some(Selector::Member(member)), Ok(parent)) = (addr.last(), addr.parent()) {
                if self.schema_node_at(&parent).is_some() {
                    return Err(SchemaError::UnknownMember {
                        path: parent.to_string(),
                        member: member.clone(),
                    });
                }
            }
            return Err(SchemaError::NonexistentSchemaNode(addr.schema_path()));
        };
        let as_entry = addr.last().is_some_and(Selector::is_entry);
        convert_node(&schema, raw, &addr.to_string(), as_entry)
    }

    fn convert_op_input(&self, op_name: &str, raw: &Value) -> Result<Value, SchemaError> {
        match self.operations.get(op_name) {
            Some(input) => {
                // A missing input is an empty input object.
                let empty = Value::Object(Default::default());
                let raw = if raw.is_null() { &empty } else { raw };
                Ok(convert_node(input, raw, &input.path, false)?.to_value())
            }
            None => Ok(raw.clone()),
        }
    }
}

impl Default for SchemaTree {
    fn default() -> Self {
        let root = Arc::new(SchemaNode {
            name: String::new(),
            path: "/".to_string(),
            kind: SchemaNodeKind::Root,
            state: false,
            children: IndexMap::new(),
        });
        let mut index = PathIndex::new();
        index.insert("/".to_string(), Arc::clone(&root));
        Self { root, index, operations: HashMap::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: &str = r#"{
        "children": [
            {"kind": "container", "name": "srv:server", "children": [
                {"kind": "list", "name": "listen", "keys": ["address", "port"], "children": [
                    {"kind": "leaf", "name": "address", "type": "string"},
                    {"kind": "leaf", "name": "port", "type": "uint16"}
                ]},
                {"kind": "leaf-list", "name": "tags", "type": "string"},
                {"kind": "container", "name": "stats", "state": true, "children": [
                    {"kind": "leaf", "name": "queries", "type": "uint64"}
                ]}
            ]}
        ],
        "operations": [
            {"name": "srv:restart", "input": [{"kind": "leaf", "name": "delay", "type": "uint32"}]}
        ]
    }"#;

    fn schema() -> SchemaTree {
        SchemaTree::from_json_str(SCHEMA).unwrap()
    }

    #[test]
    fn url_values_take_declared_key_names() {
        let addr = schema().resolve_path("/srv:server/listen=::1,53", PathFormat::Url).unwrap();
        assert_eq!(
            addr.last(),
            Some(&Selector::Keys(vec![("address".into(), "::1".into()), ("port".into(), "53".into())]))
        );
    }

    #[test]
    fn xpath_keys_are_reordered() {
        let a = schema()
            .resolve_path("/srv:server/listen[port='53'][address='::1']", PathFormat::XPath)
            .unwrap();
        let b = schema().resolve_path("/srv:server/listen=::1,53", PathFormat::Url).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn key_count_mismatch_is_rejected() {
        let err = schema().resolve_path("/srv:server/listen=::1", PathFormat::Url).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSelector { .. }));
        let err = schema()
            .resolve_path("/srv:server/listen[address='::1']", PathFormat::XPath)
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSelector { .. }));
    }

    #[test]
    fn key_values_take_canonical_form() {
        let s = schema();
        let plain = s.resolve_path("/srv:server/listen=::1,53", PathFormat::Url).unwrap();
        for expr in ["/srv:server/listen=::1,053", "/srv:server/listen=::1,+53"] {
            assert_eq!(s.resolve_path(expr, PathFormat::Url).unwrap(), plain);
        }
        let xpath = s
            .resolve_path("/srv:server/listen[address='::1'][port='+53']", PathFormat::XPath)
            .unwrap();
        assert_eq!(xpath, plain);
    }

    #[test]
    fn ill_typed_key_is_invalid_selector() {
        let s = schema();
        for expr in ["/srv:server/listen=::1,abc", "/srv:server/listen=::1,70000"] {
            let err = s.resolve_path(expr, PathFormat::Url).unwrap_err();
            assert!(matches!(err, SchemaError::InvalidSelector { .. }), "{expr}: {err}");
        }
        let err = s
            .resolve_path("/srv:server/listen[address='::1'][port='x']", PathFormat::XPath)
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSelector { .. }));
    }

    #[test]
    fn unknown_step_is_nonexistent() {
        let err = schema().resolve_path("/srv:server/nope", PathFormat::Url).unwrap_err();
        assert_eq!(err, SchemaError::NonexistentSchemaNode("/srv:server/nope".into()));
    }

    #[test]
    fn cannot_descend_through_unselected_list() {
        let err = schema().resolve_path("/srv:server/listen/port", PathFormat::Url).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSelector { .. }));
    }

    #[test]
    fn leaf_list_value_selectors() {
        let a = schema().resolve_path("/srv:server/tags[.='x']", PathFormat::XPath).unwrap();
        let b = schema().resolve_path("/srv:server/tags=x", PathFormat::Url).unwrap();
        assert_eq!(a, b);
        let c = schema().resolve_path("/srv:server/tags[2]", PathFormat::XPath).unwrap();
        assert_eq!(c.last(), Some(&Selector::Index(1)));
    }

    #[test]
    fn state_roots_below_and_above() {
        let s = schema();
        let server = s.resolve_path("/srv:server", PathFormat::Url).unwrap();
        assert_eq!(s.state_roots(&server), vec!["/srv:server/stats".to_string()]);
        let inside = s.resolve_path("/srv:server/stats/queries", PathFormat::Url).unwrap();
        assert_eq!(s.state_roots(&inside), vec!["/srv:server/stats".to_string()]);
        let listen = s.resolve_path("/srv:server/listen", PathFormat::Url).unwrap();
        assert!(s.state_roots(&listen).is_empty());
    }

    #[test]
    fn from_raw_entry_vs_array() {
        let s = schema();
        let list = s.resolve_path("/srv:server/listen", PathFormat::Url).unwrap();
        let node = s.from_raw(&list, &json!([{"address": "::1", "port": 53}])).unwrap();
        assert_eq!(node.as_array().map(|a| a.len()), Some(1));

        let entry = s.resolve_path("/srv:server/listen=::1,53", PathFormat::Url).unwrap();
        let node = s.from_raw(&entry, &json!({"address": "::1", "port": 53})).unwrap();
        assert!(node.as_object().is_some());
    }

    #[test]
    fn from_raw_unknown_member() {
        let s = schema();
        let addr = Address::root().member("srv:server").member("bogus");
        let err = s.from_raw(&addr, &json!(1)).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownMember { .. }));
    }

    #[test]
    fn operation_input_is_converted() {
        let s = schema();
        assert_eq!(s.convert_op_input("srv:restart", &json!({"delay": "5"})).unwrap(), json!({"delay": 5}));
        assert!(s.convert_op_input("srv:restart", &json!({"nope": 1})).is_err());
        assert_eq!(s.convert_op_input("srv:restart", &Value::Null).unwrap(), json!({}));
        assert_eq!(s.convert_op_input("undeclared", &json!([1])).unwrap(), json!([1]));
    }

    #[test]
    fn toml_description() {
        let s = SchemaTree::from_toml_str(
            r#"
            [[children]]
            kind = "container"
            name = "system"

            [[children.children]]
            kind = "leaf"
            name = "hostname"
            type = "string"
            "#,
        )
        .unwrap();
        assert!(s.schema_node("/system/hostname").is_some());
        assert!(s.schema_node("system/hostname/").is_some());
    }
}
