//! Resource identifier grammar (URL style): `/name/list=k1,k2/leaf`.

use crate::types::{RawSelector, RawStep};
use crate::PathError;

/// Decode `%XX` escapes in a key value.
///
/// ```
/// use confstore_path::percent_decode;
///
/// assert_eq!(percent_decode("a%2Cb").unwrap(), "a,b");
/// assert_eq!(percent_decode("%3A%3A1").unwrap(), "::1");
/// ```
///
/// # Errors
///
/// Returns [`PathError::PercentDecode`] if the decoded bytes are not UTF-8.
pub fn percent_decode(raw: &str) -> Result<String, PathError> {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| PathError::PercentDecode(e.to_string()))
}

/// Encode a key value for use in a resource identifier.
///
/// ```
/// use confstore_path::percent_encode;
///
/// assert_eq!(percent_encode("a,b/c"), "a%2Cb%2Fc");
/// assert_eq!(percent_encode("plain"), "plain");
/// ```
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Parse a resource identifier into unresolved steps.
///
/// The empty string and `/` both denote the root. A leading `/` is optional
/// and a single trailing `/` is ignored.
///
/// ```
/// use confstore_path::{parse_resource_id, RawSelector, RawStep};
///
/// let steps = parse_resource_id("/dns:server/zone=example.com/ttl").unwrap();
/// assert_eq!(steps, vec![
///     RawStep::new("dns:server"),
///     RawStep::with("zone", RawSelector::Values(vec!["example.com".into()])),
///     RawStep::new("ttl"),
/// ]);
/// ```
///
/// # Errors
///
/// - [`PathError::EmptySegment`] for `//` inside the expression
/// - [`PathError::PercentDecode`] for a key value that is not UTF-8
pub fn parse_resource_id(expr: &str) -> Result<Vec<RawStep>, PathError> {
    let body = expr.strip_prefix('/').unwrap_or(expr);
    let body = body.strip_suffix('/').unwrap_or(body);
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let mut steps = Vec::new();
    for segment in body.split('/') {
        if segment.is_empty() {
            return Err(PathError::EmptySegment(expr.to_string()));
        }
        match segment.split_once('=') {
            Some((name, values)) => {
                let values = values
                    .split(',')
                    .map(percent_decode)
                    .collect::<Result<Vec<_>, _>>()?;
                steps.push(RawStep::with(name, RawSelector::Values(values)));
            }
            None => steps.push(RawStep::new(segment)),
        }
    }
    Ok(steps)
}
