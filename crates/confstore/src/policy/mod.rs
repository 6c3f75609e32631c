//! Access-control policy service.
//!
//! The datastore asks a [`PolicyEngine`] for a per-user [`UserPolicy`] and
//! authorizes every operation through it. [`RulePolicy`] is the bundled
//! rule-list implementation.

pub mod rules;

pub use rules::{AccessRule, PolicyConfig, RulePolicy};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use confstore_path::Address;
use serde::{Deserialize, Serialize};

use crate::tree::NodeRef;

/// Permission kinds checked by the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Create,
    Update,
    Delete,
    Invoke,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Create => "create",
            Permission::Update => "update",
            Permission::Delete => "delete",
            Permission::Invoke => "invoke",
        }
    }

    /// Create, update and delete.
    pub fn is_write(&self) -> bool {
        matches!(self, Permission::Create | Permission::Update | Permission::Delete)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Permission::Read),
            "create" => Ok(Permission::Create),
            "update" => Ok(Permission::Update),
            "delete" => Ok(Permission::Delete),
            "invoke" | "exec" => Ok(Permission::Invoke),
            other => Err(format!("unknown permission \"{other}\"")),
        }
    }
}

/// Outcome of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Permit,
    Deny,
}

impl Action {
    pub fn is_permit(&self) -> bool {
        *self == Action::Permit
    }
}

/// Source of per-user evaluators.
pub trait PolicyEngine: Send + Sync {
    /// Evaluator for `user`; `None` is an anonymous caller.
    fn user_policy(&self, user: Option<&str>) -> Arc<dyn UserPolicy>;
}

/// Evaluates one user's permissions.
pub trait UserPolicy: Send + Sync {
    fn check_data(&self, addr: &Address, permission: Permission) -> Action;

    fn check_operation(&self, op_name: &str) -> Action;

    /// Remove the parts of `node` (found at `addr`) this user may not read.
    fn prune(&self, _addr: &Address, node: NodeRef) -> NodeRef {
        node
    }
}

/// Permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAll;

impl UserPolicy for PermitAll {
    fn check_data(&self, _addr: &Address, _permission: Permission) -> Action {
        Action::Permit
    }

    fn check_operation(&self, _op_name: &str) -> Action {
        Action::Permit
    }
}

impl PolicyEngine for PermitAll {
    fn user_policy(&self, _user: Option<&str>) -> Arc<dyn UserPolicy> {
        Arc::new(PermitAll)
    }
}
