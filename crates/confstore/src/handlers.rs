//! Operation handler and live state provider registries.
//!
//! Both registries are plain values owned by the application and handed to
//! the datastore through [`DatastoreBuilder`](crate::DatastoreBuilder).

use std::collections::HashMap;
use std::sync::Arc;

use confstore_path::{normalize_schema_path, Address};
use serde_json::Value;

use crate::error::Result;
use crate::tree::NodeRef;

// ── Operations ────────────────────────────────────────────────────────────

/// Implementation of a named operation.
pub trait OpHandler: Send + Sync {
    /// Run the operation on already converted input and return its output.
    fn call(&self, input: &Value) -> Result<Value>;
}

impl<F> OpHandler for F
where
    F: Fn(&Value) -> Result<Value> + Send + Sync,
{
    fn call(&self, input: &Value) -> Result<Value> {
        self(input)
    }
}

/// Operation name → handler.
#[derive(Clone, Default)]
pub struct OpHandlers {
    handlers: HashMap<String, Arc<dyn OpHandler>>,
}

impl OpHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `op_name`, replacing any previous one.
    pub fn register(&mut self, op_name: impl Into<String>, handler: impl OpHandler + 'static) -> &mut Self {
        self.handlers.insert(op_name.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, op_name: &str) -> Option<&Arc<dyn OpHandler>> {
        self.handlers.get(op_name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for OpHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

// ── State data ────────────────────────────────────────────────────────────

/// Producer of live (non-configuration) data for a state-bearing subtree.
///
/// Providers run while the datastore holds its commit mutex. A provider
/// must not call back into the same datastore for an edit, a load or a read
/// that merges state: the mutex is not reentrant and the call deadlocks.
/// Unchecked reads (`get_node`, `get_node_path`, `data_root`) are safe.
pub trait StateProvider: Send + Sync {
    /// Return `root` with the provider's subtree refreshed for a read at
    /// `addr`.
    fn update_node(&self, addr: &Address, root: NodeRef) -> Result<NodeRef>;
}

impl<F> StateProvider for F
where
    F: Fn(&Address, NodeRef) -> Result<NodeRef> + Send + Sync,
{
    fn update_node(&self, addr: &Address, root: NodeRef) -> Result<NodeRef> {
        self(addr, root)
    }
}

/// Canonical schema path → provider.
#[derive(Clone, Default)]
pub struct StateProviders {
    providers: HashMap<String, Arc<dyn StateProvider>>,
}

impl StateProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema_path: &str, provider: impl StateProvider + 'static) -> &mut Self {
        self.providers.insert(normalize_schema_path(schema_path), Arc::new(provider));
        self
    }

    pub fn get(&self, schema_path: &str) -> Option<&Arc<dyn StateProvider>> {
        self.providers.get(schema_path)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for StateProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.providers.keys()).finish()
    }
}
