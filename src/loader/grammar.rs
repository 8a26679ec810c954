//! Directive grammar using chumsky
//!
//! Parses the directive text of one line (everything after the comment
//! opener) into a [`Directive`]. Accessors stay as raw text here; the
//! loader resolves them against the open loop variables.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::LoadError;
use crate::loader::lexer::{lex, Token};

/// One parsed directive line
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Foreach { var: String, collection: String },
    Replace {
        pattern: String,
        accessor: String,
        remove_if_null: bool,
    },
    Define { name: String },
    Insert { accessor: String },
    End,
}

/// Parse one directive line.
///
/// `offset` is the byte position of `text` within the template source; it
/// shifts error spans so diagnostics point into the original buffer.
pub fn parse_directive(text: &str, offset: usize) -> Result<Directive, LoadError> {
    let len = text.len();

    let token_iter = lex(text).map(|(tok, span)| (tok, span.into()));
    let token_stream = Stream::from_iter(token_iter)
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    directive_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| {
            let err = errs
                .into_iter()
                .next()
                .expect("failed parse produces at least one error");
            rich_to_load_error(err, offset)
        })
}

fn directive_parser<'a, I>() -> impl Parser<'a, I, Directive, extra::Err<Rich<'a, Token>>>
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let accessor = select! {
        Token::Accessor(s) => s,
    };

    let string = select! {
        Token::Str(s) => s,
    };

    let foreach = just(Token::Foreach)
        .ignore_then(
            accessor
                .then_ignore(just(Token::Colon))
                .then(accessor)
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
        )
        .map(|(var, collection)| Directive::Foreach { var, collection });

    let replace = just(Token::Replace)
        .ignore_then(
            string
                .then_ignore(just(Token::Comma))
                .then(accessor)
                .then(
                    just(Token::Comma)
                        .ignore_then(just(Token::RemoveIfNull))
                        .or_not(),
                )
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
        )
        .map(|((pattern, accessor), removable)| Directive::Replace {
            pattern,
            accessor,
            remove_if_null: removable.is_some(),
        });

    let define = just(Token::Define)
        .ignore_then(string.delimited_by(just(Token::ParenOpen), just(Token::ParenClose)))
        .map(|name| Directive::Define { name });

    let insert = just(Token::Insert)
        .ignore_then(accessor.delimited_by(just(Token::ParenOpen), just(Token::ParenClose)))
        .map(|accessor| Directive::Insert { accessor });

    let fin = just(Token::End).to(Directive::End);

    just(Token::Template)
        .ignore_then(choice((foreach, replace, define, insert, fin)))
        .then_ignore(end())
}

/// Convert a chumsky error into a [`LoadError`], shifting its span by
/// `offset` into template-source coordinates
fn rich_to_load_error(err: Rich<'_, Token>, offset: usize) -> LoadError {
    use chumsky::error::RichReason;

    let message = match err.reason() {
        RichReason::ExpectedFound { found, .. } => match found {
            Some(tok) => format!("unexpected {}", format_token(tok)),
            None => "unexpected end of directive".to_string(),
        },
        RichReason::Custom(msg) => msg.to_string(),
    };

    let expected: Vec<String> = err
        .expected()
        .filter_map(|e| match e {
            chumsky::error::RichPattern::Token(tok) => Some(format_token(tok)),
            chumsky::error::RichPattern::Label(label) => Some(label.to_string()),
            chumsky::error::RichPattern::EndOfInput => Some("end of directive".to_string()),
            chumsky::error::RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
            chumsky::error::RichPattern::Any => Some("any token".to_string()),
            chumsky::error::RichPattern::SomethingElse => None,
        })
        .collect();

    let range = err.span().into_range();
    LoadError::DirectiveSyntax {
        span: (range.start + offset)..(range.end + offset),
        message,
        expected,
    }
}

/// Format a token for human-readable error messages
fn format_token(tok: &Token) -> String {
    match tok {
        Token::Template => "keyword 'TEMPLATE'".to_string(),
        Token::Foreach => "keyword 'FOREACH'".to_string(),
        Token::Replace => "keyword 'REPLACE'".to_string(),
        Token::Define => "keyword 'DEFINE'".to_string(),
        Token::Insert => "keyword 'INSERT'".to_string(),
        Token::End => "keyword 'END'".to_string(),
        Token::RemoveIfNull => "keyword 'REMOVE_IF_NULL'".to_string(),
        Token::ParenOpen => "'('".to_string(),
        Token::ParenClose => "')'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Colon => "':'".to_string(),
        Token::Accessor(s) => format!("accessor '{}'", s),
        Token::Str(s) => format!("string \"{}\"", s),
    }
}
