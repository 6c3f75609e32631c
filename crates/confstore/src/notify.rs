//! Post-commit change notification.
//!
//! Listeners register under a canonical schema path. After a committed
//! edit, the notifier visits the edited node's schema path and then every
//! ancestor up to `/`, calling the listeners registered at each level in
//! registration order.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use confstore_path::{schema_parent, Address};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::schema::{SchemaModel, SchemaNode};

/// Observer of committed edits.
pub trait DataListener: Send + Sync {
    /// Called with the schema node of the level being notified and the
    /// address of the edited node.
    fn process(&self, schema: &SchemaNode, addr: &Address);
}

impl<F> DataListener for F
where
    F: Fn(&SchemaNode, &Address) + Send + Sync,
{
    fn process(&self, schema: &SchemaNode, addr: &Address) {
        self(schema, addr)
    }
}

#[derive(Default)]
pub struct ChangeNotifier {
    listeners: RwLock<HashMap<String, Vec<Arc<dyn DataListener>>>>,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read();
        let mut map = f.debug_map();
        for (path, list) in listeners.iter() {
            map.entry(path, &list.len());
        }
        map.finish()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` at a canonical schema path. Registrations are
    /// never removed.
    pub fn add(&self, schema_path: impl Into<String>, listener: Arc<dyn DataListener>) {
        self.listeners.write().entry(schema_path.into()).or_default().push(listener);
    }

    /// Number of listeners registered exactly at `schema_path`.
    pub fn listeners_at(&self, schema_path: &str) -> usize {
        self.listeners.read().get(schema_path).map_or(0, Vec::len)
    }

    /// Notify every level from `addr`'s schema node up to the root.
    ///
    /// Listener panics are logged and swallowed; the edit stays committed.
    pub fn notify(&self, schema: &dyn SchemaModel, addr: &Address) {
        let start = addr.schema_path();
        let mut level = Some(start.as_str());

        while let Some(path) = level {
            // Snapshot the level so listeners may register new listeners.
            let listeners = self.listeners.read().get(path).cloned().unwrap_or_default();
            if !listeners.is_empty() {
                match schema.schema_node(path) {
                    Some(node) => {
                        debug!(%addr, level = path, count = listeners.len(), "notifying listeners");
                        for listener in &listeners {
                            let result = catch_unwind(AssertUnwindSafe(|| listener.process(&node, addr)));
                            if result.is_err() {
                                warn!(%addr, level = path, "listener panicked");
                            }
                        }
                    }
                    None => warn!(level = path, "listeners registered at unknown schema path"),
                }
            }
            level = schema_parent(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaTree;
    use parking_lot::Mutex;

    fn schema() -> SchemaTree {
        SchemaTree::from_json_str(
            r#"{"children": [{"kind": "container", "name": "a", "children": [
                {"kind": "container", "name": "b", "children": [
                    {"kind": "leaf", "name": "c", "type": "string"}]}]}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn child_to_root_then_registration_order() {
        let schema = schema();
        let notifier = ChangeNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for (path, tag) in [("/", "root"), ("/a", "a1"), ("/a/b/c", "c"), ("/a", "a2"), ("/a/b", "b")] {
            let seen = Arc::clone(&seen);
            notifier.add(path, Arc::new(move |_: &SchemaNode, _: &Address| seen.lock().push(tag)));
        }

        let addr = Address::root().member("a").member("b").member("c");
        notifier.notify(&schema, &addr);
        assert_eq!(*seen.lock(), vec!["c", "b", "a1", "a2", "root"]);
    }

    #[test]
    fn listener_sees_level_schema_node() {
        let schema = schema();
        let notifier = ChangeNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            notifier.add(
                "/a",
                Arc::new(move |node: &SchemaNode, addr: &Address| {
                    seen.lock().push((node.path.clone(), addr.to_string()))
                }),
            );
        }
        notifier.notify(&schema, &Address::root().member("a").member("b"));
        assert_eq!(*seen.lock(), vec![("/a".to_string(), "/a/b".to_string())]);
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let schema = schema();
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(Mutex::new(0));
        notifier.add("/a", Arc::new(|_: &SchemaNode, _: &Address| panic!("boom")));
        {
            let hits = Arc::clone(&hits);
            notifier.add("/", Arc::new(move |_: &SchemaNode, _: &Address| *hits.lock() += 1));
        }
        notifier.notify(&schema, &Address::root().member("a"));
        assert_eq!(*hits.lock(), 1);
        assert_eq!(notifier.listeners_at("/a"), 1);
    }
}
