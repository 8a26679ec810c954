//! Load-time policy configuration
//!
//! The directive grammar is fixed, but a few behaviors are policy: which
//! comment syntaxes may introduce a directive line, how tabs count toward
//! indentation, whether a `REPLACE` pattern that matches nothing is an
//! error, and what `REMOVE_IF_NULL` removes. Options can be built
//! programmatically or loaded from a TOML file.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading options from TOML
#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("Failed to read options file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse options TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Unknown policy value '{value}' for {key}")]
    UnknownPolicy { key: String, value: String },
}

/// Behavior when a `REPLACE` pattern matches nothing in its region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyReplacePolicy {
    /// Loading fails - a pattern that matches nothing usually means the
    /// template text drifted from its directives
    #[default]
    Error,
    /// The region loads with zero sites
    Allow,
}

/// What `REMOVE_IF_NULL` removes when no replacement applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoveIfNullPolicy {
    /// Drop the whole physical line containing the match
    #[default]
    Line,
    /// Substitute an empty string for the match only
    MatchOnly,
}

/// Policy knobs consulted by the loader and builder
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Comment openers that may precede the `TEMPLATE` keyword on a
    /// directive line (a bare `TEMPLATE …` line is always recognized)
    pub comment_prefixes: Vec<String>,
    /// Comment closers stripped from the end of a directive line
    pub comment_suffixes: Vec<String>,
    /// Column width of a tab character when measuring indentation
    pub tab_width: usize,
    pub on_empty_replace: EmptyReplacePolicy,
    pub remove_if_null: RemoveIfNullPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            comment_prefixes: ["//", "#", "--", ";", "*", "/*", "<!--"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            comment_suffixes: ["*/", "-->"].iter().map(|s| s.to_string()).collect(),
            tab_width: 4,
            on_empty_replace: EmptyReplacePolicy::default(),
            remove_if_null: RemoveIfNullPolicy::default(),
        }
    }
}

/// TOML structure for deserializing options
#[derive(Deserialize)]
struct TomlOptions {
    comment_prefixes: Option<Vec<String>>,
    comment_suffixes: Option<Vec<String>>,
    tab_width: Option<usize>,
    policy: Option<HashMap<String, String>>,
}

impl LoadOptions {
    /// Create options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse options from a TOML string; absent keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, OptionsError> {
        let parsed: TomlOptions = toml::from_str(content)?;
        let mut options = Self::default();

        if let Some(prefixes) = parsed.comment_prefixes {
            options.comment_prefixes = prefixes;
        }
        if let Some(suffixes) = parsed.comment_suffixes {
            options.comment_suffixes = suffixes;
        }
        if let Some(width) = parsed.tab_width {
            options.tab_width = width;
        }
        if let Some(policy) = parsed.policy {
            for (key, value) in policy {
                match (key.as_str(), value.as_str()) {
                    ("empty-replace", "error") => {
                        options.on_empty_replace = EmptyReplacePolicy::Error
                    }
                    ("empty-replace", "allow") => {
                        options.on_empty_replace = EmptyReplacePolicy::Allow
                    }
                    ("remove-if-null", "line") => {
                        options.remove_if_null = RemoveIfNullPolicy::Line
                    }
                    ("remove-if-null", "match-only") => {
                        options.remove_if_null = RemoveIfNullPolicy::MatchOnly
                    }
                    _ => return Err(OptionsError::UnknownPolicy { key, value }),
                }
            }
        }

        Ok(options)
    }
}
