//! Raw value → validated tree conversion.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Number, Value};

use super::{BaseType, LeafType, SchemaError, SchemaNode, SchemaNodeKind};
use crate::tree::{Members, Node, NodeRef};

fn value_type(raw: &Value) -> &'static str {
    match raw {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(path: &str, expected: &str, raw: &Value) -> SchemaError {
    SchemaError::TypeError {
        path: path.to_string(),
        expected: expected.to_string(),
        found: value_type(raw).to_string(),
    }
}

fn child_path(path: &str, name: &str) -> String {
    if path == "/" {
        format!("/{name}")
    } else {
        format!("{path}/{name}")
    }
}

/// Convert `raw` against `schema`.
///
/// `as_entry` selects entry conversion for lists and leaf-lists: a single
/// list entry object or a single leaf-list scalar instead of the whole array.
/// `path` is only used in error messages.
pub fn convert_node(
    schema: &SchemaNode,
    raw: &Value,
    path: &str,
    as_entry: bool,
) -> Result<NodeRef, SchemaError> {
    match &schema.kind {
        SchemaNodeKind::Root | SchemaNodeKind::Container => convert_object(schema, raw, path),
        SchemaNodeKind::List { keys } if as_entry => {
            let entry = convert_object(schema, raw, path)?;
            if let Node::Object(members) = &*entry {
                if let Some(missing) = keys.iter().find(|k| !members.contains_key(*k)) {
                    return Err(SchemaError::MissingKey { path: path.to_string(), key: missing.clone() });
                }
            }
            Ok(entry)
        }
        SchemaNodeKind::LeafList { ty } if as_entry => Ok(Arc::new(Node::Leaf(convert_leaf(ty, raw, path)?))),
        SchemaNodeKind::List { keys } => convert_entries(schema, raw, path, keys),
        SchemaNodeKind::LeafList { .. } => convert_entries(schema, raw, path, &[]),
        SchemaNodeKind::Leaf { ty } => Ok(Arc::new(Node::Leaf(convert_leaf(ty, raw, path)?))),
    }
}

fn convert_object(schema: &SchemaNode, raw: &Value, path: &str) -> Result<NodeRef, SchemaError> {
    let Value::Object(map) = raw else {
        return Err(type_error(path, "object", raw));
    };
    let mut members = Members::with_capacity(map.len());
    for (name, value) in map {
        let child = schema.child(name).ok_or_else(|| SchemaError::UnknownMember {
            path: path.to_string(),
            member: name.clone(),
        })?;
        let converted = convert_node(child, value, &child_path(path, name), false)?;
        members.insert(name.clone(), converted);
    }
    Ok(Arc::new(Node::Object(members)))
}

fn convert_entries(
    schema: &SchemaNode,
    raw: &Value,
    path: &str,
    keys: &[String],
) -> Result<NodeRef, SchemaError> {
    let Value::Array(items) = raw else {
        return Err(type_error(path, "array", raw));
    };
    let mut seen = HashSet::with_capacity(items.len());
    let mut entries = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let entry_path = format!("{path}[{}]", i + 1);
        let entry = convert_node(schema, item, &entry_path, true)?;
        if let Some(tuple) = entry.key_tuple(keys) {
            if !seen.insert(tuple.clone()) {
                return Err(SchemaError::DuplicateKey { path: path.to_string(), key: tuple.to_string() });
            }
        }
        entries.push(entry);
    }
    Ok(Arc::new(Node::Array(entries)))
}

/// Convert and validate one scalar.
pub fn convert_leaf(ty: &LeafType, raw: &Value, path: &str) -> Result<Value, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidValue { path: path.to_string(), reason };

    match ty.base {
        BaseType::String => {
            let s = raw.as_str().ok_or_else(|| type_error(path, "string", raw))?;
            if let Some(pattern) = &ty.pattern {
                if !pattern.is_match(s) {
                    return Err(invalid(format!("\"{s}\" does not match pattern")));
                }
            }
            Ok(raw.clone())
        }
        BaseType::Boolean => match raw {
            Value::Bool(_) => Ok(raw.clone()),
            _ => Err(type_error(path, "boolean", raw)),
        },
        BaseType::Enumeration => {
            let s = raw.as_str().ok_or_else(|| type_error(path, "enumeration", raw))?;
            if ty.enums.iter().any(|e| e == s) {
                Ok(raw.clone())
            } else {
                Err(invalid(format!("\"{s}\" is not one of {:?}", ty.enums)))
            }
        }
        BaseType::Decimal64 => {
            let f = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .ok_or_else(|| type_error(path, "decimal64", raw))?;
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| invalid(format!("{f} is not a finite number")))
        }
        base => {
            // Integer types: numbers, or numeric strings as in 64-bit JSON encodings.
            let (min, max) = base.int_bounds().unwrap_or((i128::MIN, i128::MAX));
            let n: i128 = match raw {
                Value::Number(n) => n
                    .as_i64()
                    .map(i128::from)
                    .or_else(|| n.as_u64().map(i128::from)),
                Value::String(s) => s.trim().parse::<i128>().ok(),
                _ => None,
            }
            .ok_or_else(|| type_error(path, base.as_str(), raw))?;
            if n < min || n > max {
                return Err(invalid(format!("{n} out of range for {}", base.as_str())));
            }
            Ok(match i64::try_from(n) {
                Ok(v) => Value::from(v),
                Err(_) => Value::from(n as u64),
            })
        }
    }
}
