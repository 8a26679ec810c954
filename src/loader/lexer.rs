//! Lexer for directive lines using logos
//!
//! Only the directive text itself is lexed (the part of the line after any
//! comment opener); literal template lines never reach this lexer.

use logos::Logos;

use crate::model::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t]+")]
pub enum Token {
    #[token("TEMPLATE")]
    Template,

    // Directive keywords
    #[token("FOREACH")]
    Foreach,
    #[token("REPLACE")]
    Replace,
    #[token("DEFINE")]
    Define,
    #[token("INSERT")]
    Insert,
    #[token("END")]
    End,
    #[token("REMOVE_IF_NULL")]
    RemoveIfNull,

    // Delimiters
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,

    // Accessor text is captured loosely; the loader validates it so a
    // malformed accessor reports as such rather than as a lex failure
    #[regex(r"\$[A-Za-z0-9_.]*", |lex| lex.slice().to_string())]
    Accessor(String),

    // Quoted strings keep their escapes untouched: REPLACE patterns are
    // regular expressions and interpret backslashes themselves
    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    Str(String),
}

/// Lex directive text into tokens with spans
pub fn lex(input: &str) -> impl Iterator<Item = (Token, Span)> + '_ {
    Token::lexer(input)
        .spanned()
        .filter_map(|(tok, span)| tok.ok().map(|t| (t, span)))
}
