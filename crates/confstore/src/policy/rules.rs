//! Ordered rule-list policy.
//!
//! Rules are matched in order; the first rule matching the user, the target
//! and the permission decides. When no rule matches, the default for the
//! permission class applies (`read_default`, `write_default` or
//! `exec_default`).
//!
//! ```toml
//! write_default = "deny"
//!
//! [[rules]]
//! users = ["admin"]
//! action = "permit"
//!
//! [[rules]]
//! path = "/dns-server:dns-server/statistics"
//! permissions = ["read"]
//! action = "deny"
//! ```

use std::sync::Arc;

use confstore_path::{split_schema_path, Address, Selector};
use serde::Deserialize;

use super::{Action, Permission, PolicyEngine, UserPolicy};
use crate::tree::{Node, NodeRef};

/// One access rule.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessRule {
    #[serde(default)]
    pub name: Option<String>,
    /// User names the rule applies to; `*` matches everyone.
    #[serde(default = "any_user")]
    pub users: Vec<String>,
    /// Schema path prefix of data the rule covers.
    #[serde(default)]
    pub path: Option<String>,
    /// Operation name the rule covers.
    #[serde(default)]
    pub operation: Option<String>,
    /// Permissions the rule covers; empty covers all.
    #[serde(default)]
    pub permissions: Vec<Permission>,
    pub action: Action,
}

fn any_user() -> Vec<String> {
    vec!["*".to_string()]
}

impl AccessRule {
    fn matches_user(&self, user: Option<&str>) -> bool {
        self.users.iter().any(|u| u == "*" || Some(u.as_str()) == user)
    }

    fn matches_permission(&self, permission: Permission) -> bool {
        self.permissions.is_empty() || self.permissions.contains(&permission)
    }

    /// A rule with neither `path` nor `operation` covers everything.
    fn matches_data(&self, schema_path: &[&str]) -> bool {
        match &self.path {
            Some(prefix) => {
                let prefix = split_schema_path(prefix);
                schema_path.len() >= prefix.len() && schema_path[..prefix.len()] == prefix[..]
            }
            None => self.operation.is_none(),
        }
    }

    fn matches_operation(&self, op_name: &str) -> bool {
        match &self.operation {
            Some(op) => op == "*" || op == op_name,
            None => self.path.is_none(),
        }
    }

    /// The rule denies reading somewhere strictly below `schema_path`.
    fn denies_read_below(&self, schema_path: &[&str]) -> bool {
        self.action == Action::Deny
            && self.matches_permission(Permission::Read)
            && self.path.as_deref().is_some_and(|p| {
                let p = split_schema_path(p);
                p.len() > schema_path.len() && p[..schema_path.len()] == schema_path[..]
            })
    }
}

/// Policy configuration: class defaults and an ordered rule list.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub read_default: Action,
    pub write_default: Action,
    pub exec_default: Action,
    pub rules: Vec<AccessRule>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            read_default: Action::Permit,
            write_default: Action::Deny,
            exec_default: Action::Permit,
            rules: Vec::new(),
        }
    }
}

/// [`PolicyEngine`] over a [`PolicyConfig`].
#[derive(Debug, Clone)]
pub struct RulePolicy {
    config: Arc<PolicyConfig>,
}

impl RulePolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config: Arc::new(config) }
    }
}

impl PolicyEngine for RulePolicy {
    fn user_policy(&self, user: Option<&str>) -> Arc<dyn UserPolicy> {
        let rules = self
            .config
            .rules
            .iter()
            .filter(|r| r.matches_user(user))
            .cloned()
            .collect();
        Arc::new(UserRules {
            read_default: self.config.read_default,
            write_default: self.config.write_default,
            exec_default: self.config.exec_default,
            rules,
        })
    }
}

/// Rules of one user.
#[derive(Debug)]
struct UserRules {
    read_default: Action,
    write_default: Action,
    exec_default: Action,
    rules: Vec<AccessRule>,
}

impl UserRules {
    fn check_schema_path(&self, schema_path: &[&str], permission: Permission) -> Action {
        self.rules
            .iter()
            .find(|r| r.matches_permission(permission) && r.matches_data(schema_path))
            .map_or_else(|| self.default_for(permission), |r| r.action)
    }

    fn default_for(&self, permission: Permission) -> Action {
        if permission.is_write() {
            self.write_default
        } else if permission == Permission::Invoke {
            self.exec_default
        } else {
            self.read_default
        }
    }

    fn prune_node(&self, schema_path: &mut Vec<String>, node: &NodeRef) -> NodeRef {
        let names: Vec<&str> = schema_path.iter().map(String::as_str).collect();
        if !self.rules.iter().any(|r| r.denies_read_below(&names)) {
            return Arc::clone(node);
        }

        match &**node {
            Node::Object(members) => {
                let mut kept = members.clone();
                let mut changed = false;
                for (name, child) in members {
                    schema_path.push(name.clone());
                    let child_names: Vec<&str> = schema_path.iter().map(String::as_str).collect();
                    if self.check_schema_path(&child_names, Permission::Read).is_permit() {
                        let pruned = self.prune_node(schema_path, child);
                        if !Arc::ptr_eq(&pruned, child) {
                            kept.insert(name.clone(), pruned);
                            changed = true;
                        }
                    } else {
                        kept.shift_remove(name);
                        changed = true;
                    }
                    schema_path.pop();
                }
                if changed {
                    Arc::new(Node::Object(kept))
                } else {
                    Arc::clone(node)
                }
            }
            Node::Array(items) => {
                let pruned: Vec<NodeRef> = items.iter().map(|i| self.prune_node(schema_path, i)).collect();
                if pruned.iter().zip(items).all(|(a, b)| Arc::ptr_eq(a, b)) {
                    Arc::clone(node)
                } else {
                    Arc::new(Node::Array(pruned))
                }
            }
            Node::Leaf(_) => Arc::clone(node),
        }
    }
}

impl UserPolicy for UserRules {
    fn check_data(&self, addr: &Address, permission: Permission) -> Action {
        let names: Vec<&str> = addr.iter().filter_map(Selector::as_member).collect();
        self.check_schema_path(&names, permission)
    }

    fn check_operation(&self, op_name: &str) -> Action {
        self.rules
            .iter()
            .find(|r| r.matches_permission(Permission::Invoke) && r.matches_operation(op_name))
            .map_or(self.exec_default, |r| r.action)
    }

    fn prune(&self, addr: &Address, node: NodeRef) -> NodeRef {
        let mut schema_path: Vec<String> =
            addr.iter().filter_map(Selector::as_member).map(str::to_string).collect();
        self.prune_node(&mut schema_path, &node)
    }
}
