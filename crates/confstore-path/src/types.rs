//! Type definitions for resolved addresses and unresolved path steps.

use std::fmt;

use crate::PathError;

/// Ordered key-leaf values identifying one list entry.
///
/// Values are compared in their canonical string form, so a numeric key `5`
/// stored in the tree matches the key string `"5"` taken from a path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyTuple(pub Vec<String>);

impl KeyTuple {
    pub fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for KeyTuple {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for KeyTuple {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<String>> for KeyTuple {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl fmt::Display for KeyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

/// One step of a resolved [`Address`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Object member by name.
    Member(String),
    /// Array entry by zero-based position.
    Index(usize),
    /// List entry by `(key name, key value)` pairs, in declared key order.
    Keys(Vec<(String, String)>),
}

impl Selector {
    pub fn member(name: impl Into<String>) -> Self {
        Selector::Member(name.into())
    }

    /// Builds a key selector from `(name, value)` pairs.
    pub fn keys<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Selector::Keys(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn as_member(&self) -> Option<&str> {
        match self {
            Selector::Member(name) => Some(name),
            _ => None,
        }
    }

    /// The key tuple carried by a [`Selector::Keys`] step.
    pub fn key_tuple(&self) -> Option<KeyTuple> {
        match self {
            Selector::Keys(pairs) => Some(KeyTuple(pairs.iter().map(|(_, v)| v.clone()).collect())),
            _ => None,
        }
    }

    pub fn is_entry(&self) -> bool {
        !matches!(self, Selector::Member(_))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Member(name) => write!(f, "/{name}"),
            // Positions are 1-based in instance-identifier syntax.
            Selector::Index(idx) => write!(f, "[{}]", idx + 1),
            Selector::Keys(pairs) => {
                for (name, value) in pairs {
                    if value.contains('\'') {
                        write!(f, "[{name}=\"{value}\"]")?;
                    } else {
                        write!(f, "[{name}='{value}']")?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// A resolved instance identifier: the canonical address of one node in the
/// configuration tree.
///
/// An `Address` is produced by resolving a path expression against a schema;
/// every prefix of it names an existing schema node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Address {
    steps: Vec<Selector>,
}

impl Address {
    /// The address of the document root.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(steps: Vec<Selector>) -> Self {
        Self { steps }
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Selector] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&Selector> {
        self.steps.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Selector> {
        self.steps.iter()
    }

    /// The address one step up.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::NoParent`] for the root address.
    pub fn parent(&self) -> Result<Address, PathError> {
        if self.steps.is_empty() {
            return Err(PathError::NoParent);
        }
        Ok(Address::new(self.steps[..self.steps.len() - 1].to_vec()))
    }

    pub fn push(&mut self, selector: Selector) {
        self.steps.push(selector);
    }

    /// A new address extended by one selector.
    pub fn join(&self, selector: Selector) -> Address {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.extend_from_slice(&self.steps);
        steps.push(selector);
        Address::new(steps)
    }

    /// A new address extended by one member step.
    pub fn member(&self, name: impl Into<String>) -> Address {
        self.join(Selector::Member(name.into()))
    }

    /// Canonical schema path: member names only, entry selectors dropped.
    ///
    /// ```
    /// use confstore_path::{Address, Selector};
    ///
    /// let addr = Address::root()
    ///     .member("dns:server")
    ///     .member("zone")
    ///     .join(Selector::keys([("domain", "example.com")]))
    ///     .member("ttl");
    /// assert_eq!(addr.schema_path(), "/dns:server/zone/ttl");
    /// assert_eq!(Address::root().schema_path(), "/");
    /// ```
    pub fn schema_path(&self) -> String {
        let names: Vec<&str> = self.steps.iter().filter_map(Selector::as_member).collect();
        if names.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for name in names {
            out.push('/');
            out.push_str(name);
        }
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "/");
        }
        for step in &self.steps {
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

impl From<Vec<Selector>> for Address {
    fn from(steps: Vec<Selector>) -> Self {
        Address::new(steps)
    }
}

impl<'a> IntoIterator for &'a Address {
    type Item = &'a Selector;
    type IntoIter = std::slice::Iter<'a, Selector>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Selector attached to an unresolved [`RawStep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSelector {
    /// Positional key values (`list=a,b`); key names come from the schema.
    Values(Vec<String>),
    /// Named key predicates (`list[k='a'][k2='b']`).
    Keys(Vec<(String, String)>),
    /// 1-based position predicate (`list[2]`).
    Position(usize),
    /// Leaf-list value predicate (`leaf-list[.='a']`).
    LeafValue(String),
}

/// One step of a parsed but not yet schema-resolved path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStep {
    pub name: String,
    pub selector: Option<RawSelector>,
}

impl RawStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), selector: None }
    }

    pub fn with(name: impl Into<String>, selector: RawSelector) -> Self {
        Self { name: name.into(), selector: Some(selector) }
    }
}
