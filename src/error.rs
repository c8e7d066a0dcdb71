//! Error types for template compilation

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },

    #[error("unclosed '{delimiter}' at {span:?}")]
    UnclosedDelimiter { delimiter: String, span: Span },

    #[error("unknown tag '{name}'")]
    UnknownTag { name: String, span: Span },

    /// An end or intermediate tag with no matching opener
    #[error("unexpected tag '{name}'")]
    UnexpectedTag { name: String, span: Span },

    #[error("'{tag}' is never closed (expected one of: {})", expected.join(", "))]
    Unclosed {
        tag: String,
        span: Span,
        expected: Vec<String>,
    },

    /// Tag arguments that parse but do not fit the tag
    #[error("{message}")]
    Malformed { message: String, span: Span },
}

impl ParseError {
    pub fn syntax(span: Span, message: impl Into<String>) -> Self {
        Self::Syntax {
            span,
            message: message.into(),
            expected: Vec::new(),
        }
    }

    pub fn malformed(span: Span, message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            Self::Syntax { span, .. }
            | Self::UnclosedDelimiter { span, .. }
            | Self::UnknownTag { span, .. }
            | Self::UnexpectedTag { span, .. }
            | Self::Unclosed { span, .. }
            | Self::Malformed { span, .. } => span,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let span = self.span().clone();
        let label = match self {
            ParseError::Syntax {
                message, expected, ..
            } if !expected.is_empty() => {
                format!("{}\nExpected: {}", message, expected.join(", "))
            }
            other => other.to_string(),
        };

        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message(self.to_string())
            .with_label(
                Label::new((filename, span))
                    .with_message(label)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

impl<'a> From<chumsky::error::Rich<'a, crate::parser::lexer::Token>> for ParseError {
    fn from(err: chumsky::error::Rich<'a, crate::parser::lexer::Token>) -> Self {
        use chumsky::error::RichReason;

        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => {
                let found_str = match found {
                    Some(tok) => format_token(tok),
                    None => "end of input".to_string(),
                };
                format!("Unexpected {}", found_str)
            }
            RichReason::Custom(msg) => msg.to_string(),
        };

        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                chumsky::error::RichPattern::Token(tok) => Some(format_token(tok)),
                chumsky::error::RichPattern::Label(label) => Some(label.to_string()),
                chumsky::error::RichPattern::EndOfInput => Some("end of input".to_string()),
                chumsky::error::RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
                chumsky::error::RichPattern::Any => Some("any token".to_string()),
                chumsky::error::RichPattern::SomethingElse => None,
            })
            .collect();

        ParseError::Syntax {
            span: err.span().into_range(),
            message,
            expected,
        }
    }
}

/// Format a token for human-readable error messages
fn format_token(tok: &crate::parser::lexer::Token) -> String {
    use crate::parser::lexer::Token;
    match tok {
        Token::Ident(s) => format!("identifier '{}'", s),
        Token::Str(s) => format!("string \"{}\"", s),
        Token::Int(n) => format!("number {}", n),
        Token::Float(n) => format!("number {}", n),
        Token::And => "keyword 'and'".to_string(),
        Token::Or => "keyword 'or'".to_string(),
        Token::Not => "keyword 'not'".to_string(),
        Token::In => "keyword 'in'".to_string(),
        Token::True => "'true'".to_string(),
        Token::False => "'false'".to_string(),
        Token::Nil => "'none'".to_string(),
        Token::Priority => "keyword 'priority'".to_string(),
        Token::ParenOpen => "'('".to_string(),
        Token::ParenClose => "')'".to_string(),
        Token::BracketOpen => "'['".to_string(),
        Token::BracketClose => "']'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Dot => "'.'".to_string(),
        _ => format!("{:?}", tok),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_accessor() {
        let err = ParseError::UnknownTag {
            name: "blorp".to_string(),
            span: 3..12,
        };
        assert_eq!(err.span(), &(3..12));
        assert_eq!(err.to_string(), "unknown tag 'blorp'");
    }

    #[test]
    fn test_unclosed_display_lists_expected() {
        let err = ParseError::Unclosed {
            tag: "for".to_string(),
            span: 0..10,
            expected: vec!["empty".to_string(), "endfor".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "'for' is never closed (expected one of: empty, endfor)"
        );
    }

    #[test]
    fn test_format_includes_source_line() {
        let source = "hello {% blorp %}";
        let err = ParseError::UnknownTag {
            name: "blorp".to_string(),
            span: 6..17,
        };
        let report = err.format(source, "page.tmpl");
        assert!(report.contains("page.tmpl"));
        assert!(report.contains("unknown tag 'blorp'"));
    }
}
