//! JSON pointer handling for deep edits (`/children/1/age`).

use schemodel_core::{Error, Result};
use serde_json::Value;

/// A change addressed by a pointer.
#[derive(Debug, Clone)]
pub(crate) enum Edit {
    Set(Value),
    Unset,
}

/// Split a pointer into unescaped reference tokens.
pub(crate) fn parse(pointer: &str) -> Result<Vec<String>> {
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(invalid(pointer, "a pointer must start with '/'"));
    };
    if rest.is_empty() {
        return Err(invalid(pointer, "the pointer must name a field"));
    }
    Ok(rest
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect())
}

/// Escape a single reference token.
pub(crate) fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Pointer to a direct child named `token`.
pub(crate) fn child(token: &str) -> String {
    format!("/{}", escape(token))
}

/// Resolve an array token; `-` addresses the slot past the end.
pub(crate) fn parse_index(pointer: &str, token: &str, len: usize) -> Result<usize> {
    if token == "-" {
        return Ok(len);
    }
    if token.len() > 1 && token.starts_with('0') {
        return Err(invalid(pointer, "array indexes must not have leading zeros"));
    }
    token
        .parse::<usize>()
        .map_err(|_| invalid(pointer, &format!("'{token}' is not an array index")))
}

pub(crate) fn invalid(pointer: &str, reason: &str) -> Error {
    Error::InvalidPointer {
        pointer: pointer.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unescaped() {
        let tokens = parse("/a~1b/c~0d/0").expect("valid pointer");
        assert_eq!(tokens, vec!["a/b", "c~d", "0"]);
    }

    #[test]
    fn root_and_relative_pointers_are_rejected() {
        assert!(matches!(parse(""), Err(Error::InvalidPointer { .. })));
        assert!(matches!(parse("/"), Err(Error::InvalidPointer { .. })));
        assert!(matches!(parse("a/b"), Err(Error::InvalidPointer { .. })));
    }

    #[test]
    fn indexes_follow_pointer_rules() {
        assert_eq!(parse_index("/x/-", "-", 3).expect("dash"), 3);
        assert_eq!(parse_index("/x/2", "2", 3).expect("index"), 2);
        assert!(parse_index("/x/01", "01", 3).is_err());
        assert!(parse_index("/x/a", "a", 3).is_err());
    }

    #[test]
    fn escape_round_trips() {
        assert_eq!(child("a/b~c"), "/a~1b~0c");
        assert_eq!(parse(&child("a/b~c")).expect("valid pointer"), vec!["a/b~c"]);
    }
}
