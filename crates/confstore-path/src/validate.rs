//! Validation functions for path expressions and step names.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::RawStep;
use crate::PathError;

/// Maximum allowed path expression length.
pub const MAX_EXPRESSION_LENGTH: usize = 4096;

/// Maximum allowed path depth.
pub const MAX_PATH_LENGTH: usize = 256;

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Optional `module:` prefix followed by an identifier.
    RE.get_or_init(|| Regex::new(r"^(?:[A-Za-z_][A-Za-z0-9_.\-]*:)?[A-Za-z_][A-Za-z0-9_.\-]*$").unwrap())
}

/// Check if `name` is a valid (optionally module-qualified) node name.
///
/// ```
/// use confstore_path::is_valid_name;
///
/// assert!(is_valid_name("zones"));
/// assert!(is_valid_name("dns-server:dns-server"));
/// assert!(!is_valid_name("1abc"));
/// assert!(!is_valid_name("a:b:c"));
/// assert!(!is_valid_name(""));
/// ```
pub fn is_valid_name(name: &str) -> bool {
    name_regex().is_match(name)
}

/// Validate a raw path expression before parsing.
///
/// # Errors
///
/// Returns [`PathError::ExpressionTooLong`] past [`MAX_EXPRESSION_LENGTH`].
pub fn validate_expression(expr: &str) -> Result<(), PathError> {
    if expr.len() > MAX_EXPRESSION_LENGTH {
        return Err(PathError::ExpressionTooLong);
    }
    Ok(())
}

/// Validate parsed steps: depth limit and step names.
///
/// # Errors
///
/// - [`PathError::PathTooLong`] past [`MAX_PATH_LENGTH`] steps
/// - [`PathError::InvalidName`] for a malformed step name
pub fn validate_steps(steps: &[RawStep]) -> Result<(), PathError> {
    if steps.len() > MAX_PATH_LENGTH {
        return Err(PathError::PathTooLong);
    }
    for step in steps {
        if !is_valid_name(&step.name) {
            return Err(PathError::InvalidName(step.name.clone()));
        }
    }
    Ok(())
}
