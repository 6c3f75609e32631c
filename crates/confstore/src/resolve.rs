//! External path expressions → [`Address`].

use std::sync::Arc;

use confstore_path::{Address, PathFormat};

use crate::error::{DatastoreError, Result};
use crate::schema::SchemaModel;

#[derive(Clone)]
pub struct PathResolver {
    schema: Arc<dyn SchemaModel>,
}

impl PathResolver {
    pub fn new(schema: Arc<dyn SchemaModel>) -> Self {
        Self { schema }
    }

    /// Resolve `expr` written in `format`. Pure: the same input always
    /// yields the same address.
    ///
    /// # Errors
    ///
    /// [`DatastoreError::InvalidPath`] if the expression does not parse or
    /// any step has no schema node.
    pub fn resolve(&self, expr: &str, format: PathFormat) -> Result<Address> {
        Ok(self.schema.resolve_path(expr, format)?)
    }

    /// Address of a request: its pre-resolved address, else its path.
    pub fn resolve_rpc(&self, address: Option<&Address>, path: Option<&str>, format: PathFormat) -> Result<Address> {
        match (address, path) {
            (Some(addr), _) => Ok(addr.clone()),
            (None, Some(path)) => self.resolve(path, format),
            (None, None) => Err(DatastoreError::InvalidPath("request carries no path".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaTree;

    fn resolver() -> PathResolver {
        let schema = SchemaTree::from_json_str(
            r#"{"children": [{"kind": "list", "name": "l", "keys": ["k"], "children": [
                {"kind": "leaf", "name": "k", "type": "string"}]}]}"#,
        )
        .unwrap();
        PathResolver::new(Arc::new(schema))
    }

    #[test]
    fn formats_agree() {
        let r = resolver();
        assert_eq!(
            r.resolve("/l=a", PathFormat::Url).unwrap(),
            r.resolve("/l[k='a']", PathFormat::XPath).unwrap()
        );
    }

    #[test]
    fn unknown_is_invalid_path() {
        let err = resolver().resolve("/nope", PathFormat::Url).unwrap_err();
        assert_eq!(err.kind(), "invalid-path");
        let err = resolver().resolve("relative", PathFormat::XPath).unwrap_err();
        assert_eq!(err.kind(), "invalid-path");
    }

    #[test]
    fn rpc_prefers_address() {
        let addr = Address::root().member("l");
        assert_eq!(resolver().resolve_rpc(Some(&addr), Some("/nope"), PathFormat::Url).unwrap(), addr);
        assert!(resolver().resolve_rpc(None, None, PathFormat::Url).is_err());
    }
}
