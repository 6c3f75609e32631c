//! Request descriptor.

use confstore_path::{Address, KeyTuple, PathFormat};
use serde_json::Value;

use crate::engine::InsertMode;

/// One datastore request.
///
/// ```
/// use confstore::{InsertMode, Rpc};
/// use serde_json::json;
///
/// let rpc = Rpc::new("admin")
///     .path("/dns-server:dns-server/zones")
///     .input(json!({"zone": {"domain": "example.com"}}))
///     .insert(InsertMode::Before)
///     .point("example.org");
/// assert_eq!(rpc.user.as_deref(), Some("admin"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Rpc {
    pub user: Option<String>,
    pub path: Option<String>,
    pub path_format: PathFormat,
    /// Pre-resolved target; takes precedence over `path`.
    pub address: Option<Address>,
    pub op_name: Option<String>,
    pub input: Option<Value>,
    pub insert: Option<InsertMode>,
    pub point: Option<KeyTuple>,
    /// Skip the operation access check (internal invocations).
    pub skip_access_check: bool,
}

impl Rpc {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: Some(user.into()), ..Self::default() }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn format(mut self, format: PathFormat) -> Self {
        self.path_format = format;
        self
    }

    /// Interpret the path as an instance identifier.
    pub fn xpath(self) -> Self {
        self.format(PathFormat::XPath)
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn op(mut self, op_name: impl Into<String>) -> Self {
        self.op_name = Some(op_name.into());
        self
    }

    pub fn input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn insert(mut self, mode: InsertMode) -> Self {
        self.insert = Some(mode);
        self
    }

    pub fn point(mut self, point: impl Into<KeyTuple>) -> Self {
        self.point = Some(point.into());
        self
    }

    pub fn skip_access_check(mut self) -> Self {
        self.skip_access_check = true;
        self
    }
}
