//! Lexers for template source using logos
//!
//! Lexing happens in two layers. [`segments`] splits raw template source into
//! literal text, `{{ ... }}` outputs and `{% ... %}` tags (comments are
//! dropped). [`lex_expression`] then turns the inside of an output or tag into
//! [`Token`]s for the expression grammar.

use logos::Logos;

use crate::config::Options;
use crate::error::ParseError;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Raw delimiter-level tokens
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum Delimited {
    // Quoted strings are skipped whole, so `{{ "}}" }}` closes at the second `}}`
    #[regex(r#"\{\{([^}"']|\}[^}"']|\}?"([^"\\]|\\.)*"|\}?'([^'\\]|\\.)*')*\}\}"#)]
    Variable,

    #[regex(r#"\{%([^%"']|%[^}"']|%?"([^"\\]|\\.)*"|%?'([^'\\]|\\.)*')*%\}"#)]
    Tag,

    #[regex(r"\{#([^#]|#[^}])*#\}")]
    Comment,

    // An opening delimiter that never found its closing counterpart
    #[token("{{")]
    #[token("{%")]
    #[token("{#")]
    Unclosed,

    #[regex(r"[^{]+")]
    #[token("{")]
    Text,
}

/// A top-level piece of template source
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text copied to the output
    Text(String),
    /// Inside of `{{ ... }}`; `offset` is the byte position of `source` in the template
    Variable { source: String, offset: usize },
    /// Inside of `{% ... %}`; `offset` is the byte position of `source` in the template
    Tag { source: String, offset: usize },
}

/// Split template source into segments, applying block whitespace options
pub fn segments(input: &str, options: &Options) -> Result<Vec<(Segment, Span)>, ParseError> {
    let mut out: Vec<(Segment, Span)> = Vec::new();

    for (tok, span) in Delimited::lexer(input).spanned() {
        let tok = tok.map_err(|_| ParseError::syntax(span.clone(), "Unexpected character"))?;
        let slice = &input[span.clone()];
        let inner = || (slice[2..slice.len() - 2].to_string(), span.start + 2);

        match tok {
            Delimited::Text => match out.last_mut() {
                // `{` is lexed on its own, so glue adjacent text back together
                Some((Segment::Text(prev), prev_span)) if prev_span.end == span.start => {
                    prev.push_str(slice);
                    prev_span.end = span.end;
                }
                _ => out.push((Segment::Text(slice.to_string()), span)),
            },
            Delimited::Variable => {
                let (source, offset) = inner();
                out.push((Segment::Variable { source, offset }, span));
            }
            Delimited::Tag => {
                let (source, offset) = inner();
                out.push((Segment::Tag { source, offset }, span));
            }
            Delimited::Comment => {}
            Delimited::Unclosed => {
                return Err(ParseError::UnclosedDelimiter {
                    delimiter: slice.to_string(),
                    span,
                })
            }
        }
    }

    if options.trim_blocks || options.lstrip_blocks {
        apply_block_whitespace(&mut out, options);
    }

    Ok(out)
}

/// Strip whitespace around block tags the way `trim_blocks`/`lstrip_blocks` ask for
fn apply_block_whitespace(segments: &mut Vec<(Segment, Span)>, options: &Options) {
    for i in 0..segments.len() {
        let next_is_tag = matches!(segments.get(i + 1), Some((Segment::Tag { .. }, _)));
        let prev_is_tag = i > 0 && matches!(segments[i - 1].0, Segment::Tag { .. });

        if let Segment::Text(text) = &mut segments[i].0 {
            if options.lstrip_blocks && next_is_tag {
                let kept = text.trim_end_matches([' ', '\t']).len();
                text.truncate(kept);
            }
            if options.trim_blocks && prev_is_tag && text.starts_with('\n') {
                text.remove(0);
            }
        }
    }

    segments.retain(|(seg, _)| !matches!(seg, Segment::Text(t) if t.is_empty()));
}

/// Tokens inside outputs and tag arguments
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Keywords
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("in")]
    In,
    #[token("true")]
    #[token("True")]
    True,
    #[token("false")]
    #[token("False")]
    False,
    #[token("none")]
    #[token("None")]
    Nil,
    #[token("priority")]
    Priority,

    // Comparison operators (longer first)
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessOrEqual,
    #[token(">=")]
    GreaterOrEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,

    // Arithmetic
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    // Delimiters
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,

    // Literals - identifiers must come after keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, unquote)]
    #[regex(r#"'([^'\\]|\\.)*'"#, unquote)]
    Str(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
}

fn unquote(lex: &mut logos::Lexer<Token>) -> String {
    let s = lex.slice();
    let mut out = String::with_capacity(s.len());
    let mut chars = s[1..s.len() - 1].chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Lex an expression; spans are shifted by `offset` so they point into the template
pub fn lex_expression(input: &str, offset: usize) -> Result<Vec<(Token, Span)>, ParseError> {
    let mut out: Vec<(Token, Span)> = Vec::new();

    for (tok, span) in Token::lexer(input).spanned() {
        let shifted = span.start + offset..span.end + offset;
        let tok = tok.map_err(|_| {
            ParseError::syntax(shifted.clone(), "Unexpected character in expression")
        })?;

        // `a.1.0` is two accesses, not an access by the float `1.0`
        if matches!(tok, Token::Float(_)) && matches!(out.last(), Some((Token::Dot, _))) {
            out.extend(split_float(&input[span], shifted)?);
        } else {
            out.push((tok, shifted));
        }
    }

    Ok(out)
}

/// Turn the source of a float literal into `Int Dot Int`
fn split_float(slice: &str, span: Span) -> Result<[(Token, Span); 3], ParseError> {
    let int = |digits: &str, span: Span| match digits.parse::<i64>() {
        Ok(n) => Ok((Token::Int(n), span)),
        Err(_) => Err(ParseError::syntax(span, "Invalid index")),
    };
    let Some((head, tail)) = slice.split_once('.') else {
        return Err(ParseError::syntax(span, "Invalid index"));
    };
    let at = span.start + head.len();

    Ok([
        int(head, span.start..at)?,
        (Token::Dot, at..at + 1),
        int(tail, at + 1..span.end)?,
    ])
}
