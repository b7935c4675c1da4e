//! Error types for weaving and resolution
//!
//! Weave-time errors are programming errors in schema composition and are
//! surfaced synchronously from [`crate::SchemaLoom::weave`]. Resolution errors
//! are per-field `async_graphql::Error`s and never abort sibling fields.

use thiserror::Error;

/// Errors raised while weaving a schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeaveError {
    /// Two distinct types ended up with the same final name
    #[error("type name \"{name}\" is claimed by more than one distinct type")]
    DuplicateTypeName { name: String },

    /// Two distinct descriptors were attached under one field name
    #[error("field \"{field}\" on type \"{type_name}\" is already defined by another resolver")]
    FieldConflict { type_name: String, field: String },

    /// A type cannot be used in the position it was given
    #[error("{}", mark_location(.message, .location))]
    ShapeConversion {
        /// Dotted location, outermost segment first
        location: Vec<String>,
        message: String,
    },

    /// An anonymous type was never reached through a field path
    #[error("anonymous type could not be named: {0}")]
    UnnamedType(String),

    /// Resolver containers were put together incorrectly
    #[error("invalid composition: {0}")]
    InvalidComposition(String),

    /// async-graphql rejected the emitted schema
    #[error("schema validation failed: {0}")]
    Schema(String),
}

impl WeaveError {
    /// Create a shape conversion error without a location
    pub fn shape(message: impl Into<String>) -> Self {
        Self::ShapeConversion {
            location: Vec::new(),
            message: message.into(),
        }
    }

    /// Prepend a location segment to a shape conversion error
    ///
    /// Called from the innermost conversion outwards, so the final location
    /// reads from the outermost field to the innermost one. Other variants
    /// are returned unchanged.
    pub fn at(self, segment: impl Into<String>) -> Self {
        match self {
            Self::ShapeConversion {
                mut location,
                message,
            } => {
                location.insert(0, segment.into());
                Self::ShapeConversion { location, message }
            }
            other => other,
        }
    }
}

/// Result type for weave operations
pub type WeaveResult<T> = Result<T, WeaveError>;

/// Result type for field resolution
pub type ResolveResult<T> = async_graphql::Result<T>;

/// Prefix a message with a bracketed dotted location
///
/// A message that already starts with a `[location]` prefix keeps it, with the
/// new segments placed in front: `mark_location("[b] oops", ["a"])` gives
/// `"[a.b] oops"`.
pub fn mark_location<S: AsRef<str>>(message: &str, locations: &[S]) -> String {
    if locations.is_empty() {
        return message.to_string();
    }

    let (existing, rest) = match split_location(message) {
        Some((prefix, rest)) => (Some(prefix), rest),
        None => (None, message),
    };

    let mut segments: Vec<&str> = locations.iter().map(AsRef::as_ref).collect();
    if let Some(prefix) = existing {
        segments.push(prefix);
    }

    format!("[{}] {}", segments.join("."), rest)
}

fn split_location(message: &str) -> Option<(&str, &str)> {
    let stripped = message.strip_prefix('[')?;
    let end = stripped.find(']')?;
    Some((&stripped[..end], stripped[end + 1..].trim_start()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_location_without_prefix() {
        assert_eq!(mark_location("oops", &["a", "b"]), "[a.b] oops");
    }

    #[test]
    fn test_mark_location_merges_existing_prefix() {
        assert_eq!(mark_location("[c] oops", &["a", "b"]), "[a.b.c] oops");
    }

    #[test]
    fn test_mark_location_no_locations() {
        assert_eq!(mark_location("oops", &[] as &[&str]), "oops");
    }

    #[test]
    fn test_shape_error_nests_innermost_first() {
        let err = WeaveError::shape("Cannot convert SearchResult to input type")
            .at("filter")
            .at("search");
        assert_eq!(
            err.to_string(),
            "[search.filter] Cannot convert SearchResult to input type"
        );
    }

    #[test]
    fn test_at_leaves_other_variants_alone() {
        let err = WeaveError::InvalidComposition("x".to_string()).at("field");
        assert_eq!(err, WeaveError::InvalidComposition("x".to_string()));
    }

    #[test]
    fn test_error_display() {
        let err = WeaveError::FieldConflict {
            type_name: "User".to_string(),
            field: "posts".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "field \"posts\" on type \"User\" is already defined by another resolver"
        );
    }
}
