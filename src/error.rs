//! Load-time error types and diagnostic rendering

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::model::Span;

/// Errors raised while loading a template.
///
/// All load errors are fatal: no partial template is ever produced. Every
/// variant carries the source span of the offending directive or line so
/// that [`LoadError::format`] can render it in context.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A directive region was opened but never closed
    #[error("unclosed {directive} region")]
    UnclosedRegion { directive: String, span: Span },

    /// A `TEMPLATE END` with no open region
    #[error("END directive without a matching open region")]
    StrayEnd { span: Span },

    /// Directive line that did not parse
    #[error("directive syntax error: {message}")]
    DirectiveSyntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },

    /// Malformed `$…` accessor text
    #[error("invalid field accessor '{text}'")]
    InvalidAccessor { text: String, span: Span },

    /// A `REPLACE` pattern that is not a valid regular expression
    #[error("invalid REPLACE pattern \"{pattern}\": {message}")]
    InvalidPattern {
        pattern: String,
        span: Span,
        message: String,
    },

    /// A `REPLACE` region whose pattern matched nothing in its body
    #[error("REPLACE pattern \"{pattern}\" matched nothing in its region ({accessor})")]
    EmptyReplace {
        pattern: String,
        accessor: String,
        span: Span,
    },

    /// `DEFINE` encountered by the single-template loader
    #[error("DEFINE(\"{name}\") is only recognized by the batch loader")]
    MisplacedDefine { name: String, span: Span },

    /// A `DEFINE` nested inside another `DEFINE`
    #[error("DEFINE(\"{name}\") nested inside another definition")]
    NestedDefine { name: String, span: Span },

    /// Two `DEFINE` regions with the same name
    #[error("duplicate definition \"{name}\"")]
    DuplicateDefine { name: String, span: Span },
}

impl LoadError {
    /// Source span of the offending directive or line
    pub fn span(&self) -> &Span {
        match self {
            LoadError::UnclosedRegion { span, .. }
            | LoadError::StrayEnd { span }
            | LoadError::DirectiveSyntax { span, .. }
            | LoadError::InvalidAccessor { span, .. }
            | LoadError::InvalidPattern { span, .. }
            | LoadError::EmptyReplace { span, .. }
            | LoadError::MisplacedDefine { span, .. }
            | LoadError::NestedDefine { span, .. }
            | LoadError::DuplicateDefine { span, .. } => span,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let span = self.span().clone();
        let mut label_message = self.to_string();
        if let LoadError::DirectiveSyntax { expected, .. } = self {
            if !expected.is_empty() {
                label_message.push_str(&format!("\nExpected: {}", expected.join(", ")));
            }
        }

        let mut buf = Vec::new();
        Report::build(ReportKind::Error, filename, span.start)
            .with_message(self.to_string())
            .with_label(
                Label::new((filename, span))
                    .with_message(label_message)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf)
            .unwrap();
        String::from_utf8(buf).unwrap()
    }
}
