//! The datastore: published root, entry points and their wiring.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use confstore_path::{normalize_schema_path, Address, PathFormat};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::DatastoreConfig;
use crate::engine::{self, Edit};
use crate::error::{DatastoreError, Result};
use crate::gate::AccessGate;
use crate::handlers::{OpHandlers, StateProviders};
use crate::lock::LockManager;
use crate::notify::{ChangeNotifier, DataListener};
use crate::persist::{self, JsonStorage};
use crate::policy::{Permission, PolicyEngine, RulePolicy};
use crate::resolve::PathResolver;
use crate::rpc::Rpc;
use crate::schema::SchemaModel;
use crate::tree::{Node, NodeRef};

// ── Builder ───────────────────────────────────────────────────────────────

/// Assembles a [`Datastore`] from its collaborators.
pub struct DatastoreBuilder {
    schema: Arc<dyn SchemaModel>,
    config: DatastoreConfig,
    policy: Option<Arc<dyn PolicyEngine>>,
    op_handlers: OpHandlers,
    state_providers: StateProviders,
}

impl DatastoreBuilder {
    pub fn new(schema: Arc<dyn SchemaModel>) -> Self {
        Self {
            schema,
            config: DatastoreConfig::default(),
            policy: None,
            op_handlers: OpHandlers::default(),
            state_providers: StateProviders::default(),
        }
    }

    pub fn config(mut self, config: DatastoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Install a policy engine, overriding any `[policy]` configuration.
    pub fn policy(mut self, policy: Arc<dyn PolicyEngine>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn op_handlers(mut self, handlers: OpHandlers) -> Self {
        self.op_handlers = handlers;
        self
    }

    pub fn state_providers(mut self, providers: StateProviders) -> Self {
        self.state_providers = providers;
        self
    }

    pub fn build(self) -> Datastore {
        let policy = self.policy.or_else(|| {
            self.config
                .policy
                .clone()
                .map(|p| Arc::new(RulePolicy::new(p)) as Arc<dyn PolicyEngine>)
        });
        Datastore {
            root: ArcSwap::new(Node::empty()),
            commit: Mutex::new(()),
            resolver: PathResolver::new(Arc::clone(&self.schema)),
            gate: AccessGate::new(policy),
            notifier: ChangeNotifier::new(),
            lock: LockManager::with_timeout(self.config.name.clone(), self.config.lock_timeout()),
            storage: JsonStorage::new(self.config.pretty),
            schema: self.schema,
            op_handlers: self.op_handlers,
            state_providers: self.state_providers,
            config: self.config,
        }
    }
}

// ── Datastore ─────────────────────────────────────────────────────────────

/// A schema-governed configuration tree with access control, change
/// notification and persistence.
///
/// Readers never block: they load the current root snapshot. Every root
/// replacement runs under one commit mutex, so concurrent edits are
/// serialized and none is lost.
pub struct Datastore {
    root: ArcSwap<Node>,
    commit: Mutex<()>,
    schema: Arc<dyn SchemaModel>,
    resolver: PathResolver,
    gate: AccessGate,
    notifier: ChangeNotifier,
    lock: LockManager,
    storage: JsonStorage,
    op_handlers: OpHandlers,
    state_providers: StateProviders,
    config: DatastoreConfig,
}

impl std::fmt::Debug for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datastore")
            .field("name", &self.config.name)
            .field("gate", &self.gate)
            .field("lock", &self.lock)
            .field("op_handlers", &self.op_handlers)
            .field("state_providers", &self.state_providers)
            .finish_non_exhaustive()
    }
}

impl Datastore {
    pub fn builder(schema: Arc<dyn SchemaModel>) -> DatastoreBuilder {
        DatastoreBuilder::new(schema)
    }

    /// A datastore with default configuration and no access control.
    pub fn new(schema: Arc<dyn SchemaModel>) -> Self {
        DatastoreBuilder::new(schema).build()
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn schema(&self) -> &Arc<dyn SchemaModel> {
        &self.schema
    }

    pub fn config(&self) -> &DatastoreConfig {
        &self.config
    }

    /// Current root snapshot.
    pub fn data_root(&self) -> NodeRef {
        self.root.load_full()
    }

    /// Replace the root with the outcome of `f`, under the commit mutex.
    fn commit<F>(&self, f: F) -> Result<Edit>
    where
        F: FnOnce(&NodeRef) -> Result<Edit>,
    {
        let _commit = self.commit.lock();
        let current = self.root.load_full();
        let edit = f(&current)?;
        self.root.store(Arc::clone(&edit.root));
        debug!(datastore = %self.config.name, changed = ?edit.changed.as_ref().map(|a| a.to_string()), "committed");
        Ok(edit)
    }

    fn notify(&self, edit: &Edit) {
        if let Some(addr) = &edit.changed {
            self.notifier.notify(&*self.schema, addr);
        }
    }

    fn target(&self, rpc: &Rpc) -> Result<Address> {
        self.resolver.resolve_rpc(rpc.address.as_ref(), rpc.path.as_deref(), rpc.path_format)
    }

    fn payload<'a>(&self, rpc: &'a Rpc) -> Result<&'a Value> {
        rpc.input
            .as_ref()
            .ok_or_else(|| DatastoreError::InvalidPayload("request carries no input".to_string()))
    }

    // ── Listeners ─────────────────────────────────────────────────────────

    /// Register `listener` for edits at or below the schema node `path`.
    ///
    /// # Errors
    ///
    /// [`DatastoreError::InvalidPath`] if the schema has no such node.
    pub fn add_schema_listener(&self, path: &str, listener: Arc<dyn DataListener>) -> Result<()> {
        let path = normalize_schema_path(path);
        if self.schema.schema_node(&path).is_none() {
            return Err(DatastoreError::InvalidPath(format!("nonexistent schema node: {path}")));
        }
        debug!(datastore = %self.config.name, %path, "listener registered");
        self.notifier.add(path, listener);
        Ok(())
    }

    /// Number of listeners registered at the schema node `path`.
    pub fn listeners_at(&self, path: &str) -> usize {
        self.notifier.listeners_at(&normalize_schema_path(path))
    }

    // ── Unchecked reads ───────────────────────────────────────────────────

    /// The node at `addr`, without access checks or state data.
    pub fn get_node(&self, addr: &Address) -> Result<NodeRef> {
        engine::read(&self.data_root(), addr)
    }

    pub fn get_node_path(&self, expr: &str, format: PathFormat) -> Result<NodeRef> {
        let addr = self.resolver.resolve(expr, format)?;
        self.get_node(&addr)
    }

    // ── Requests ──────────────────────────────────────────────────────────

    /// Read the node targeted by `rpc`.
    ///
    /// Live state below the target is merged in first (and published). The
    /// result is redacted for the caller.
    pub fn get_node_rpc(&self, rpc: &Rpc) -> Result<NodeRef> {
        let addr = self.target(rpc)?;
        let clearance = self.gate.check_data(rpc.user.as_deref(), &addr, Permission::Read)?;

        let mut root = self.data_root();
        if !self.schema.state_roots(&addr).is_empty() {
            let edit = self.commit(|current| {
                let merged = engine::merge_state(&*self.schema, &self.state_providers, current, &addr)?;
                Ok(Edit { root: merged.unwrap_or_else(|| Arc::clone(current)), changed: None })
            })?;
            root = edit.root;
        }

        let node = engine::read(&root, &addr)?;
        Ok(clearance.redact(&addr, node))
    }

    /// Create the single member carried in `rpc.input` under the target.
    pub fn create_node_rpc(&self, rpc: &Rpc) -> Result<()> {
        let addr = self.target(rpc)?;
        let payload = self.payload(rpc)?;
        self.gate.check_data(rpc.user.as_deref(), &addr, Permission::Create)?;

        let edit = self.commit(|current| {
            engine::create(&*self.schema, current, &addr, payload, rpc.insert, rpc.point.as_ref())
        })?;
        self.notify(&edit);
        Ok(())
    }

    /// Replace the target subtree with `rpc.input`.
    pub fn update_node_rpc(&self, rpc: &Rpc) -> Result<()> {
        let addr = self.target(rpc)?;
        let payload = self.payload(rpc)?;
        self.gate.check_data(rpc.user.as_deref(), &addr, Permission::Update)?;

        let edit = self.commit(|current| engine::update(&*self.schema, current, &addr, payload))?;
        self.notify(&edit);
        Ok(())
    }

    /// Remove the target. Deletes are not notified.
    pub fn delete_node_rpc(&self, rpc: &Rpc) -> Result<()> {
        let addr = self.target(rpc)?;
        self.gate.check_data(rpc.user.as_deref(), &addr, Permission::Delete)?;

        let edit = self.commit(|current| engine::delete(current, &addr))?;
        self.notify(&edit);
        Ok(())
    }

    /// Invoke the operation named in `rpc.op_name`; the tree is untouched.
    pub fn invoke_op_rpc(&self, rpc: &Rpc) -> Result<Value> {
        let op_name = rpc
            .op_name
            .as_deref()
            .ok_or_else(|| DatastoreError::InvalidPayload("request names no operation".to_string()))?;
        self.gate
            .check_operation(rpc.user.as_deref(), op_name, rpc.skip_access_check)?;

        let input = rpc.input.clone().unwrap_or(Value::Null);
        debug!(datastore = %self.config.name, op = op_name, "invoking operation");
        engine::invoke(&*self.schema, &self.op_handlers, op_name, &input)
    }

    // ── Lock ──────────────────────────────────────────────────────────────

    /// Take the datastore lock.
    ///
    /// # Errors
    ///
    /// [`DatastoreError::LockBusy`] if it is held by someone else after
    /// `timeout` (blocking) or immediately (non-blocking).
    pub fn lock(&self, holder: Option<&str>, blocking: bool, timeout: Option<Duration>) -> Result<()> {
        self.lock.acquire(holder, blocking, timeout)
    }

    pub fn unlock(&self) {
        self.lock.release()
    }

    pub fn lock_holder(&self) -> Option<String> {
        self.lock.holder()
    }

    // ── Persistence ───────────────────────────────────────────────────────

    /// Replace the whole tree with a validated document. On failure the
    /// previous tree stays published.
    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<()> {
        let raw = self.storage.read_value(reader)?;
        self.load_value(&raw)
    }

    pub fn load_value(&self, raw: &Value) -> Result<()> {
        let root = persist::decode(&*self.schema, raw)?;
        self.commit(|_| Ok(Edit { root, changed: None }))?;
        info!(datastore = %self.config.name, "data loaded");
        Ok(())
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let raw = self.storage.read_path(path)?;
        self.load_value(&raw)?;
        info!(datastore = %self.config.name, path = %path.display(), "loaded from file");
        Ok(())
    }

    /// Write one consistent snapshot while holding the datastore lock.
    pub fn save_to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let _guard = self.lock.hold(&self.config.save_holder)?;
        let snapshot = self.data_root();
        self.storage.write_value(writer, &persist::encode(&*self.schema, &snapshot))?;
        info!(datastore = %self.config.name, "data saved");
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let _guard = self.lock.hold(&self.config.save_holder)?;
        let snapshot = self.data_root();
        self.storage.write_path(path, &persist::encode(&*self.schema, &snapshot))?;
        info!(datastore = %self.config.name, path = %path.display(), "saved to file");
        Ok(())
    }
}
