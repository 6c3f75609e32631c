//! Navigation and path-copying edits on persistent trees.

use std::sync::Arc;

use confstore_path::{Address, Selector};

use super::{key_string, Node, NodeRef};
use crate::error::{DatastoreError, Result};

// ── Path navigation ───────────────────────────────────────────────────────

/// Position of the array entry matching all `(key, value)` pairs.
///
/// Leaf entries (leaf-lists) match the single pair `(".", value)`.
pub fn find_entry(items: &[NodeRef], pairs: &[(String, String)]) -> Option<usize> {
    items.iter().position(|entry| entry_matches(entry, pairs))
}

fn entry_matches(entry: &Node, pairs: &[(String, String)]) -> bool {
    match entry {
        Node::Object(members) => {
            !pairs.is_empty()
                && pairs.iter().all(|(k, v)| {
                    members
                        .get(k)
                        .and_then(|n| n.as_leaf())
                        .is_some_and(|leaf| key_string(leaf) == *v)
                })
        }
        Node::Leaf(value) => matches!(pairs, [(k, v)] if k == "." && key_string(value) == *v),
        Node::Array(_) => false,
    }
}

fn child<'a>(node: &'a Node, selector: &Selector) -> Option<&'a NodeRef> {
    match (node, selector) {
        (Node::Object(members), Selector::Member(name)) => members.get(name),
        (Node::Array(items), Selector::Index(idx)) => items.get(*idx),
        (Node::Array(items), Selector::Keys(pairs)) => find_entry(items, pairs).map(|i| &items[i]),
        _ => None,
    }
}

/// The node at `addr`, or `None` if any step does not exist.
pub fn goto(root: &NodeRef, addr: &Address) -> Option<NodeRef> {
    let mut current = root;
    for selector in addr {
        current = child(current, selector)?;
    }
    Some(Arc::clone(current))
}

// ── Path copying ──────────────────────────────────────────────────────────

/// Replace the node at `addr` with `f(node)`, returning the new root.
///
/// Only the nodes on the path from `addr` to the root are rebuilt; all other
/// subtrees are shared with `root`. `root` itself is left untouched.
///
/// # Errors
///
/// [`DatastoreError::NotFound`] if `addr` does not exist, or whatever `f`
/// returns.
pub fn replace_at<F>(root: &NodeRef, addr: &Address, f: F) -> Result<NodeRef>
where
    F: FnOnce(&NodeRef) -> Result<NodeRef>,
{
    rebuild(root, addr.steps(), addr, f)
}

fn rebuild<F>(node: &NodeRef, steps: &[Selector], addr: &Address, f: F) -> Result<NodeRef>
where
    F: FnOnce(&NodeRef) -> Result<NodeRef>,
{
    let Some((selector, rest)) = steps.split_first() else {
        return f(node);
    };
    let not_found = || DatastoreError::NotFound(addr.to_string());

    match (&**node, selector) {
        (Node::Object(members), Selector::Member(name)) => {
            let current = members.get(name).ok_or_else(not_found)?;
            let replaced = rebuild(current, rest, addr, f)?;
            let mut members = members.clone();
            // Existing key: IndexMap keeps its position.
            members.insert(name.clone(), replaced);
            Ok(Arc::new(Node::Object(members)))
        }
        (Node::Array(items), Selector::Index(_) | Selector::Keys(_)) => {
            let idx = match selector {
                Selector::Index(idx) if *idx < items.len() => *idx,
                Selector::Keys(pairs) => find_entry(items, pairs).ok_or_else(not_found)?,
                _ => return Err(not_found()),
            };
            let replaced = rebuild(&items[idx], rest, addr, f)?;
            let mut items = items.clone();
            items[idx] = replaced;
            Ok(Arc::new(Node::Array(items)))
        }
        _ => Err(not_found()),
    }
}

/// Create-or-replace `value` at `addr`.
///
/// The parent of `addr` must exist; the final step may name a member or a
/// keyed entry that is not there yet (it is appended).
///
/// # Errors
///
/// - [`DatastoreError::NotFound`] if the parent does not exist
/// - [`DatastoreError::TypeMismatch`] if the final step does not fit the
///   parent's kind
pub fn put(root: &NodeRef, addr: &Address, value: NodeRef) -> Result<NodeRef> {
    let Some(last) = addr.last() else {
        return Ok(value);
    };
    let parent = addr.parent()?;
    replace_at(root, &parent, |node| match (&**node, last) {
        (Node::Object(members), Selector::Member(name)) => {
            let mut members = members.clone();
            members.insert(name.clone(), value);
            Ok(Arc::new(Node::Object(members)))
        }
        (Node::Array(items), Selector::Index(idx)) if *idx < items.len() => {
            let mut items = items.clone();
            items[*idx] = value;
            Ok(Arc::new(Node::Array(items)))
        }
        (Node::Array(items), Selector::Keys(pairs)) => {
            let mut items = items.clone();
            match find_entry(&items, pairs) {
                Some(idx) => items[idx] = value,
                None => items.push(value),
            }
            Ok(Arc::new(Node::Array(items)))
        }
        (node, selector) => Err(DatastoreError::TypeMismatch(format!(
            "cannot place {selector} into {} at {parent}",
            node.kind()
        ))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> NodeRef {
        Node::from_value(&json!({
            "a": {"x": 1},
            "b": {"list": [{"k": "one", "v": 1}, {"k": "two", "v": 2}]},
            "c": ["p", "q"]
        }))
    }

    #[test]
    fn goto_by_member_index_and_keys() {
        let root = doc();
        let by_keys = Address::root()
            .member("b")
            .member("list")
            .join(Selector::keys([("k", "two")]))
            .member("v");
        assert_eq!(goto(&root, &by_keys).unwrap().to_value(), json!(2));

        let by_index = Address::root().member("c").join(Selector::Index(1));
        assert_eq!(goto(&root, &by_index).unwrap().to_value(), json!("q"));

        let by_value = Address::root().member("c").join(Selector::keys([(".", "p")]));
        assert_eq!(goto(&root, &by_value).unwrap().to_value(), json!("p"));

        assert!(goto(&root, &Address::root().member("zzz")).is_none());
        assert!(goto(&root, &Address::root().member("c").join(Selector::Index(5))).is_none());
    }

    #[test]
    fn replace_shares_untouched_subtrees() {
        let root = doc();
        let addr = Address::root().member("a").member("x");
        let next = replace_at(&root, &addr, |_| Ok(Node::leaf(99))).unwrap();

        assert_eq!(next.to_value()["a"]["x"], json!(99));
        assert_eq!(root.to_value()["a"]["x"], json!(1));
        assert!(Arc::ptr_eq(next.member("b").unwrap(), root.member("b").unwrap()));
        assert!(Arc::ptr_eq(next.member("c").unwrap(), root.member("c").unwrap()));
        assert!(!Arc::ptr_eq(next.member("a").unwrap(), root.member("a").unwrap()));
    }

    #[test]
    fn replace_missing_is_not_found() {
        let root = doc();
        let addr = Address::root().member("b").member("list").join(Selector::keys([("k", "nope")]));
        let err = replace_at(&root, &addr, |n| Ok(Arc::clone(n))).unwrap_err();
        assert!(matches!(err, DatastoreError::NotFound(_)));
    }

    #[test]
    fn put_creates_member_and_keyed_entry() {
        let root = doc();
        let next = put(&root, &Address::root().member("d"), Node::leaf("new")).unwrap();
        assert_eq!(next.to_value()["d"], json!("new"));

        let entry = Address::root().member("b").member("list").join(Selector::keys([("k", "three")]));
        let next = put(&next, &entry, Node::from_value(&json!({"k": "three"}))).unwrap();
        assert_eq!(next.to_value()["b"]["list"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn put_at_root_replaces_everything() {
        let root = doc();
        let next = put(&root, &Address::root(), Node::empty()).unwrap();
        assert_eq!(next.to_value(), json!({}));
    }

    #[test]
    fn put_into_leaf_is_type_mismatch() {
        let root = doc();
        let addr = Address::root().member("a").member("x").member("y");
        assert!(matches!(put(&root, &addr, Node::leaf(1)), Err(DatastoreError::TypeMismatch(_))));
    }
}
