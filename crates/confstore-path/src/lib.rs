//! Path grammars and resolved addresses for the confstore datastore.
//!
//! Two textual forms are understood:
//!
//! - resource identifiers ([`PathFormat::Url`]): `/dns:server/zone=example.com`
//! - instance identifiers ([`PathFormat::XPath`]): `/dns:server/zone[domain='example.com']`
//!
//! Parsing only produces unresolved [`RawStep`]s. Turning them into an
//! [`Address`] needs the schema (key names, list vs. leaf-list), which is the
//! job of the datastore's schema model.
//!
//! # Example
//!
//! ```
//! use confstore_path::{parse_path, PathFormat, RawSelector};
//!
//! let url = parse_path("/zones/zone=example.com", PathFormat::Url).unwrap();
//! let xpath = parse_path("/zones/zone[domain='example.com']", PathFormat::XPath).unwrap();
//!
//! assert_eq!(url[1].name, xpath[1].name);
//! assert_eq!(url[1].selector, Some(RawSelector::Values(vec!["example.com".into()])));
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub mod types;
pub use types::{Address, KeyTuple, RawSelector, RawStep, Selector};

pub mod validate;
pub use validate::{is_valid_name, validate_expression, validate_steps, MAX_PATH_LENGTH};

pub mod url;
pub use url::{parse_resource_id, percent_decode, percent_encode};

pub mod xpath;
pub use xpath::parse_instance_id;

/// Errors produced while parsing path expressions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path must be absolute: {0}")]
    RelativePath(String),
    #[error("empty path segment in {0}")]
    EmptySegment(String),
    #[error("invalid node name: {0}")]
    InvalidName(String),
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),
    #[error("predicates cannot be mixed in step {0}")]
    MixedPredicates(String),
    #[error("invalid position: {0}")]
    InvalidPosition(String),
    #[error("invalid percent-encoding: {0}")]
    PercentDecode(String),
    #[error("path expression too long")]
    ExpressionTooLong,
    #[error("path too long")]
    PathTooLong,
    #[error("root has no parent")]
    NoParent,
    #[error("unknown path format: {0}")]
    UnknownFormat(String),
}

/// Textual syntax of a path expression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PathFormat {
    /// Resource identifier, `/list=key`.
    #[default]
    Url,
    /// Instance identifier, `/list[key='v']`.
    XPath,
}

impl PathFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathFormat::Url => "url",
            PathFormat::XPath => "xpath",
        }
    }
}

impl fmt::Display for PathFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathFormat {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "url" | "resource" => Ok(PathFormat::Url),
            "xpath" | "instance" => Ok(PathFormat::XPath),
            other => Err(PathError::UnknownFormat(other.to_string())),
        }
    }
}

/// Parse a path expression in the given format and validate its steps.
///
/// # Errors
///
/// Any [`PathError`] from the grammar or from [`validate_steps`].
pub fn parse_path(expr: &str, format: PathFormat) -> Result<Vec<RawStep>, PathError> {
    validate_expression(expr)?;
    let steps = match format {
        PathFormat::Url => parse_resource_id(expr)?,
        PathFormat::XPath => parse_instance_id(expr)?,
    };
    validate_steps(&steps)?;
    Ok(steps)
}

/// Parent of a canonical schema path, `None` for the root `/`.
///
/// ```
/// use confstore_path::schema_parent;
///
/// assert_eq!(schema_parent("/a/b"), Some("/a"));
/// assert_eq!(schema_parent("/a"), Some("/"));
/// assert_eq!(schema_parent("/"), None);
/// ```
pub fn schema_parent(path: &str) -> Option<&str> {
    if path == "/" || path.is_empty() {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(i) => Some(&path[..i]),
        None => Some("/"),
    }
}

/// Split a canonical schema path into member names.
///
/// ```
/// use confstore_path::split_schema_path;
///
/// assert_eq!(split_schema_path("/a/b"), vec!["a", "b"]);
/// assert!(split_schema_path("/").is_empty());
/// ```
pub fn split_schema_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Normalize a schema path string: leading `/`, no trailing `/`.
///
/// ```
/// use confstore_path::normalize_schema_path;
///
/// assert_eq!(normalize_schema_path("a/b/"), "/a/b");
/// assert_eq!(normalize_schema_path(""), "/");
/// ```
pub fn normalize_schema_path(path: &str) -> String {
    let parts = split_schema_path(path);
    if parts.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for part in parts {
        out.push('/');
        out.push_str(part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("URL".parse::<PathFormat>().unwrap(), PathFormat::Url);
        assert_eq!("xpath".parse::<PathFormat>().unwrap(), PathFormat::XPath);
        assert!("json".parse::<PathFormat>().is_err());
    }

    #[test]
    fn test_parse_path_validates_names() {
        assert_eq!(
            parse_path("/ok/9bad", PathFormat::Url),
            Err(PathError::InvalidName("9bad".into()))
        );
    }

    #[test]
    fn test_schema_parent_chain() {
        let mut path = "/a/b/c";
        let mut seen = vec![path];
        while let Some(p) = schema_parent(path) {
            seen.push(p);
            path = p;
        }
        assert_eq!(seen, vec!["/a/b/c", "/a/b", "/a", "/"]);
    }
}
