//! Access gate in front of the mutation engine.

use std::sync::Arc;

use confstore_path::Address;
use tracing::debug;

use crate::error::{DatastoreError, Result};
use crate::policy::{Action, Permission, PolicyEngine, UserPolicy};
use crate::tree::NodeRef;

/// Authorizes operations against an optional [`PolicyEngine`].
///
/// Without an engine every check passes.
#[derive(Clone, Default)]
pub struct AccessGate {
    policy: Option<Arc<dyn PolicyEngine>>,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate").field("enabled", &self.policy.is_some()).finish()
    }
}

impl AccessGate {
    pub fn new(policy: Option<Arc<dyn PolicyEngine>>) -> Self {
        Self { policy }
    }

    /// Authorize `permission` on `addr` for `user`.
    ///
    /// # Errors
    ///
    /// [`DatastoreError::AccessDenied`] on a `Deny` decision.
    pub fn check_data(&self, user: Option<&str>, addr: &Address, permission: Permission) -> Result<Clearance> {
        let Some(engine) = &self.policy else {
            return Ok(Clearance { policy: None });
        };
        let policy = engine.user_policy(user);
        match policy.check_data(addr, permission) {
            Action::Permit => Ok(Clearance { policy: Some(policy) }),
            Action::Deny => {
                debug!(user = user.unwrap_or("-"), %addr, %permission, "access denied");
                Err(DatastoreError::AccessDenied(format!(
                    "{permission} of {addr} denied for user \"{}\"",
                    user.unwrap_or_default()
                )))
            }
        }
    }

    /// Authorize invoking `op_name`; `bypass` skips the check entirely.
    pub fn check_operation(&self, user: Option<&str>, op_name: &str, bypass: bool) -> Result<()> {
        let Some(engine) = &self.policy else {
            return Ok(());
        };
        if bypass {
            return Ok(());
        }
        match engine.user_policy(user).check_operation(op_name) {
            Action::Permit => Ok(()),
            Action::Deny => {
                debug!(user = user.unwrap_or("-"), op = op_name, "invocation denied");
                Err(DatastoreError::AccessDenied(format!(
                    "operation \"{op_name}\" invocation denied for user \"{}\"",
                    user.unwrap_or_default()
                )))
            }
        }
    }
}

/// Proof of a passed data check; redacts read results.
pub struct Clearance {
    policy: Option<Arc<dyn UserPolicy>>,
}

impl Clearance {
    /// Remove what the user may not read from `node` found at `addr`.
    pub fn redact(&self, addr: &Address, node: NodeRef) -> NodeRef {
        match &self.policy {
            Some(policy) => policy.prune(addr, node),
            None => node,
        }
    }
}
