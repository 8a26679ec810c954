//! Field accessors - validated references to template data
//!
//! An accessor correlates a directive declared in template text with the
//! builder call that satisfies it. Three forms exist: a global variable
//! (`$name`), a field of a named loop variable (`$var.field`), and a bare
//! loop-variable identity (`$var`).

use thiserror::Error;

/// Errors raised by the accessor factory functions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessorError {
    #[error("empty identifier in accessor")]
    EmptyIdentifier,

    #[error("invalid identifier '{text}' in accessor")]
    InvalidIdentifier { text: String },
}

/// A validated reference to caller-supplied data.
///
/// Equality between two accessors is structural; [`FieldAccessor::is_equivalent`]
/// compares against the textual `$…` form without allocating.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldAccessor {
    /// Caller-scope variable: `$name` (the path may be dotted)
    Global { path: String },
    /// Field of a named loop variable: `$var.field` (the field may be dotted)
    Field { variable: String, path: String },
    /// Bare loop-variable identity: `$var`
    Variable { name: String },
}

impl FieldAccessor {
    /// Create a global-variable accessor (`$path`)
    pub fn global(path: impl Into<String>) -> Result<Self, AccessorError> {
        let path = path.into();
        validate_path(&path)?;
        Ok(FieldAccessor::Global { path })
    }

    /// Create a loop-variable field accessor (`$variable.path`)
    pub fn field(
        variable: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self, AccessorError> {
        let variable = variable.into();
        let path = path.into();
        validate_segment(&variable)?;
        validate_path(&path)?;
        Ok(FieldAccessor::Field { variable, path })
    }

    /// Create a bare loop-variable accessor (`$name`)
    pub fn variable(name: impl Into<String>) -> Result<Self, AccessorError> {
        let name = name.into();
        validate_segment(&name)?;
        Ok(FieldAccessor::Variable { name })
    }

    /// Structurally compare this accessor against a textual form
    /// (`$name` or `$name.path`), without allocating.
    pub fn is_equivalent(&self, candidate: &str) -> bool {
        let Some(rest) = candidate.strip_prefix('$') else {
            return false;
        };
        match self {
            FieldAccessor::Global { path } => rest == path,
            FieldAccessor::Variable { name } => rest == name,
            FieldAccessor::Field { variable, path } => rest
                .strip_prefix(variable.as_str())
                .and_then(|r| r.strip_prefix('.'))
                .map(|r| r == path)
                .unwrap_or(false),
        }
    }
}

impl std::fmt::Display for FieldAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldAccessor::Global { path } => write!(f, "${}", path),
            FieldAccessor::Field { variable, path } => write!(f, "${}.{}", variable, path),
            FieldAccessor::Variable { name } => write!(f, "${}", name),
        }
    }
}

/// Validate a single identifier segment: `[A-Za-z_][A-Za-z0-9_]*`
fn validate_segment(segment: &str) -> Result<(), AccessorError> {
    let mut chars = segment.chars();
    match chars.next() {
        None => Err(AccessorError::EmptyIdentifier),
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
                Ok(())
            } else {
                Err(AccessorError::InvalidIdentifier {
                    text: segment.to_string(),
                })
            }
        }
        Some(_) => Err(AccessorError::InvalidIdentifier {
            text: segment.to_string(),
        }),
    }
}

/// Validate a possibly-dotted path: every segment must be a valid identifier
fn validate_path(path: &str) -> Result<(), AccessorError> {
    if path.is_empty() {
        return Err(AccessorError::EmptyIdentifier);
    }
    for segment in path.split('.') {
        validate_segment(segment)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_accessor() {
        let acc = FieldAccessor::global("Items").unwrap();
        assert!(acc.is_equivalent("$Items"));
        assert!(!acc.is_equivalent("$Item"));
        assert!(!acc.is_equivalent("Items"));
        assert_eq!(acc.to_string(), "$Items");
    }

    #[test]
    fn test_global_dotted_path() {
        let acc = FieldAccessor::global("Module.Items").unwrap();
        assert!(acc.is_equivalent("$Module.Items"));
        assert_eq!(acc.to_string(), "$Module.Items");
    }

    #[test]
    fn test_field_accessor() {
        let acc = FieldAccessor::field("item", "Name").unwrap();
        assert!(acc.is_equivalent("$item.Name"));
        assert!(!acc.is_equivalent("$item"));
        assert!(!acc.is_equivalent("$item.Name.More"));
        assert_eq!(acc.to_string(), "$item.Name");
    }

    #[test]
    fn test_variable_accessor() {
        let acc = FieldAccessor::variable("item").unwrap();
        assert!(acc.is_equivalent("$item"));
        assert!(!acc.is_equivalent("$item.Name"));
        assert_eq!(acc.to_string(), "$item");
    }

    #[test]
    fn test_structural_equality() {
        let a = FieldAccessor::field("item", "Name").unwrap();
        let b = FieldAccessor::field("item", "Name").unwrap();
        assert_eq!(a, b);
        // The same text can be produced by different forms; they are not equal
        let c = FieldAccessor::global("item.Name").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_empty_identifier_rejected() {
        assert_eq!(
            FieldAccessor::global(""),
            Err(AccessorError::EmptyIdentifier)
        );
        assert_eq!(
            FieldAccessor::variable(""),
            Err(AccessorError::EmptyIdentifier)
        );
        assert_eq!(
            FieldAccessor::field("item", ""),
            Err(AccessorError::EmptyIdentifier)
        );
    }

    #[test]
    fn test_malformed_identifier_rejected() {
        assert!(FieldAccessor::global("1bad").is_err());
        assert!(FieldAccessor::global("has space").is_err());
        assert!(FieldAccessor::global("a..b").is_err());
        assert!(FieldAccessor::field("a-b", "c").is_err());
        assert!(FieldAccessor::variable("item.Name").is_err());
    }

    #[test]
    fn test_underscore_identifiers() {
        assert!(FieldAccessor::global("_private").is_ok());
        assert!(FieldAccessor::field("_x", "_y_2").is_ok());
    }

    #[test]
    fn test_field_prefix_is_not_enough() {
        // "$itemX.Name" must not match Field { item, Name }
        let acc = FieldAccessor::field("item", "Name").unwrap();
        assert!(!acc.is_equivalent("$itemX.Name"));
    }
}
