//! Instance identifier grammar (XPath style):
//! `/name/list[k='v'][k2="w"]/leaf-list[.='x']/list[3]`.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{RawSelector, RawStep};
use crate::PathError;

fn predicate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^\[\s*(?:(?:(?P<dot>\.)|(?P<key>[A-Za-z_][A-Za-z0-9_.:\-]*))\s*=\s*(?:'(?P<sq>[^']*)'|"(?P<dq>[^"]*)")|(?P<pos>[0-9]+))\s*\]"#,
        )
        .unwrap()
    })
}

/// Split on `/` outside of bracketed predicates and quoted strings.
fn split_steps(body: &str) -> Result<Vec<&str>, PathError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in body.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') if depth > 0 => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| PathError::InvalidPredicate(body.to_string()))?;
            }
            (None, '/') if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 || quote.is_some() {
        return Err(PathError::InvalidPredicate(body.to_string()));
    }
    parts.push(&body[start..]);
    Ok(parts)
}

enum Predicate {
    Key(String, String),
    Dot(String),
    Position(usize),
}

fn parse_step(segment: &str, expr: &str) -> Result<RawStep, PathError> {
    let (name, mut rest) = match segment.find('[') {
        Some(i) => (&segment[..i], &segment[i..]),
        None => (segment, ""),
    };
    if name.is_empty() {
        return Err(PathError::EmptySegment(expr.to_string()));
    }

    let mut predicates = Vec::new();
    while !rest.is_empty() {
        let caps = predicate_regex()
            .captures(rest)
            .ok_or_else(|| PathError::InvalidPredicate(rest.to_string()))?;
        let whole = caps.get(0).map_or(0, |m| m.end());
        let value = caps
            .name("sq")
            .or_else(|| caps.name("dq"))
            .map(|m| m.as_str().to_string());
        let predicate = if let Some(pos) = caps.name("pos") {
            let pos: usize = pos
                .as_str()
                .parse()
                .map_err(|_| PathError::InvalidPosition(pos.as_str().to_string()))?;
            if pos == 0 {
                return Err(PathError::InvalidPosition("0".to_string()));
            }
            Predicate::Position(pos)
        } else if caps.name("dot").is_some() {
            Predicate::Dot(value.unwrap_or_default())
        } else {
            let key = caps.name("key").map_or("", |m| m.as_str()).to_string();
            Predicate::Key(key, value.unwrap_or_default())
        };
        predicates.push(predicate);
        rest = &rest[whole..];
    }

    let selector = match predicates.len() {
        0 => None,
        1 => Some(match predicates.remove(0) {
            Predicate::Key(k, v) => RawSelector::Keys(vec![(k, v)]),
            Predicate::Dot(v) => RawSelector::LeafValue(v),
            Predicate::Position(p) => RawSelector::Position(p),
        }),
        _ => {
            let mut keys = Vec::with_capacity(predicates.len());
            for predicate in predicates {
                match predicate {
                    Predicate::Key(k, v) => keys.push((k, v)),
                    _ => return Err(PathError::MixedPredicates(segment.to_string())),
                }
            }
            Some(RawSelector::Keys(keys))
        }
    };

    Ok(RawStep { name: name.to_string(), selector })
}

/// Parse an instance identifier into unresolved steps.
///
/// ```
/// use confstore_path::{parse_instance_id, RawSelector, RawStep};
///
/// let steps = parse_instance_id("/dns:server/zone[domain='example.com']").unwrap();
/// assert_eq!(steps, vec![
///     RawStep::new("dns:server"),
///     RawStep::with("zone", RawSelector::Keys(vec![("domain".into(), "example.com".into())])),
/// ]);
/// ```
///
/// # Errors
///
/// - [`PathError::RelativePath`] if the expression does not start with `/`
/// - [`PathError::InvalidPredicate`] / [`PathError::MixedPredicates`] for
///   malformed predicates
/// - [`PathError::InvalidPosition`] for `[0]`
pub fn parse_instance_id(expr: &str) -> Result<Vec<RawStep>, PathError> {
    if expr.is_empty() || expr == "/" {
        return Ok(Vec::new());
    }
    let body = expr
        .strip_prefix('/')
        .ok_or_else(|| PathError::RelativePath(expr.to_string()))?;
    split_steps(body)?
        .into_iter()
        .map(|segment| parse_step(segment, expr))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_key_predicates() {
        let steps = parse_instance_id(r#"/routes/route[prefix='10.0.0.0/8'][dev="eth0"]"#).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(
            steps[1].selector,
            Some(RawSelector::Keys(vec![
                ("prefix".into(), "10.0.0.0/8".into()),
                ("dev".into(), "eth0".into()),
            ]))
        );
    }

    #[test]
    fn test_position_and_dot() {
        let steps = parse_instance_id("/a/list[2]/names[.='x']").unwrap();
        assert_eq!(steps[1].selector, Some(RawSelector::Position(2)));
        assert_eq!(steps[2].selector, Some(RawSelector::LeafValue("x".into())));
    }

    #[test]
    fn test_whitespace_in_predicate() {
        let steps = parse_instance_id("/l[ k = 'v' ]").unwrap();
        assert_eq!(steps[0].selector, Some(RawSelector::Keys(vec![("k".into(), "v".into())])));
    }

    #[test]
    fn test_relative_rejected() {
        assert!(matches!(parse_instance_id("a/b"), Err(PathError::RelativePath(_))));
    }

    #[test]
    fn test_zero_position_rejected() {
        assert!(matches!(parse_instance_id("/l[0]"), Err(PathError::InvalidPosition(_))));
    }

    #[test]
    fn test_unbalanced_brackets() {
        assert!(matches!(parse_instance_id("/l[k='v'"), Err(PathError::InvalidPredicate(_))));
        assert!(matches!(parse_instance_id("/l]"), Err(PathError::InvalidPredicate(_))));
    }

    #[test]
    fn test_mixed_predicates() {
        assert!(matches!(parse_instance_id("/l[k='v'][2]"), Err(PathError::MixedPredicates(_))));
    }

    #[test]
    fn test_garbage_after_predicate() {
        assert!(matches!(parse_instance_id("/l[k='v']x"), Err(PathError::InvalidPredicate(_))));
    }
}
