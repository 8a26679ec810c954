//! Regent - a region-based templating engine for source-code generation
//!
//! This library loads template files annotated with directive comments
//! (`FOREACH`, `REPLACE`, `DEFINE`, `INSERT`) into an immutable range
//! model, lets driving code parameterize that model through a validated
//! builder session, and renders the result with accumulated indentation.
//!
//! # Example
//!
//! ```rust
//! use regent::FieldAccessor;
//!
//! let source = "\
//! // TEMPLATE REPLACE(\"\\$GREETING\\$\", $greeting)
//! print(\"$GREETING$\")
//! // TEMPLATE END
//! ";
//!
//! let out = regent::generate(source, |builder| {
//!     builder.replace(&FieldAccessor::global("greeting")?, |_| {
//!         Some("hello".to_string())
//!     })
//! })
//! .unwrap();
//!
//! assert_eq!(out, "print(\"hello\")\n");
//! ```

pub mod accessor;
pub mod builder;
pub mod error;
pub mod loader;
pub mod model;
pub mod options;
pub mod template;

pub use accessor::{AccessorError, FieldAccessor};
pub use builder::{BuildError, TemplateBuilder};
pub use error::LoadError;
pub use loader::{load, load_all_defined, load_all_defined_with_options, load_with_options};
pub use model::{LoadedTemplate, MatchSite};
pub use options::{EmptyReplacePolicy, LoadOptions, OptionsError, RemoveIfNullPolicy};
pub use template::ParameterizedTemplate;

use thiserror::Error;

/// Errors that can occur during the generate pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Error while loading the template
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// Error while driving the builder
    #[error("build error: {0}")]
    Build(#[from] BuildError),
}

/// Load a template, drive one builder session over it, and render the
/// result with default options and no base indentation.
///
/// This is the convenience entry point for the common single-template
/// case; for shared models, sub-template insertion, or repeated
/// rendering, use [`load`] and [`LoadedTemplate::builder`] directly.
pub fn generate<F>(source: &str, drive: F) -> Result<String, Error>
where
    F: FnOnce(&mut TemplateBuilder) -> Result<(), BuildError>,
{
    generate_with_options(source, &LoadOptions::default(), drive)
}

/// Load a template under the given options, drive one builder session,
/// and render the result.
pub fn generate_with_options<F>(
    source: &str,
    options: &LoadOptions,
    drive: F,
) -> Result<String, Error>
where
    F: FnOnce(&mut TemplateBuilder) -> Result<(), BuildError>,
{
    let model = load_with_options(source, options)?;
    let mut builder = model.builder();
    drive(&mut builder)?;
    let template = builder.finish()?;
    Ok(template.render(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_literal_template() {
        let out = generate("plain text\n", |_| Ok(())).unwrap();
        assert_eq!(out, "plain text\n");
    }

    #[test]
    fn test_generate_round_trip() {
        let source = "\
// TEMPLATE REPLACE(\"\\$X\\$\", $val)
prefix $X$ suffix
// TEMPLATE END
";
        let out = generate(source, |builder| {
            builder.replace(&FieldAccessor::global("val")?, |_| Some("42".to_string()))
        })
        .unwrap();
        assert_eq!(out, "prefix 42 suffix\n");
    }

    #[test]
    fn test_generate_reports_load_errors() {
        let err = generate("// TEMPLATE END\n", |_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::Load(LoadError::StrayEnd { .. })));
    }

    #[test]
    fn test_generate_reports_build_errors() {
        let source = "// TEMPLATE INSERT($x)\n// TEMPLATE END\n";
        let err = generate(source, |_| Ok(())).unwrap_err();
        assert!(matches!(
            err,
            Error::Build(BuildError::UnsatisfiedRegion { .. })
        ));
    }
}
