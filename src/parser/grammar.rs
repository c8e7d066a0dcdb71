//! Expression and tag-argument grammars using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::ParseError;
use crate::parser::ast::*;
use crate::parser::lexer::{lex_expression, Token};
use crate::value::Value;

/// Arguments of `{% for [key,] value in iterable %}`
#[derive(Debug, Clone, PartialEq)]
pub struct ForArgs {
    pub key: Option<Spanned<Identifier>>,
    pub value: Spanned<Identifier>,
    pub iterable: Spanned<Expr>,
}

/// Postfix accessor applied to an atom
#[derive(Debug, Clone)]
enum Accessor {
    Attr(Identifier),
    Index(Spanned<Expr>),
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

/// First chumsky error, converted; chumsky always reports at least one on failure
fn first_error<'a>(errs: Vec<Rich<'a, Token>>, eoi: usize) -> ParseError {
    errs.into_iter()
        .next()
        .map(ParseError::from)
        .unwrap_or_else(|| ParseError::syntax(eoi..eoi, "Invalid expression"))
}

/// Lex `input` and run `parser` over the tokens
///
/// The token stream type cannot be named, so this is a macro rather than a
/// function taking the parser.
macro_rules! run_parser {
    ($parser:expr, $input:expr, $offset:expr) => {{
        let (input, offset): (&str, usize) = ($input, $offset);
        let eoi = offset + input.len();
        let tokens = lex_expression(input, offset)?;
        let token_stream = Stream::from_iter(tokens.into_iter().map(|(t, s)| (t, s.into())))
            .map((eoi..eoi).into(), |(t, s): (_, _)| (t, s));

        $parser
            .parse(token_stream)
            .into_result()
            .map_err(|errs| first_error(errs, eoi))
    }};
}

/// Parse a standalone expression, e.g. the inside of `{{ ... }}`
pub fn parse_expression(input: &str, offset: usize) -> Result<Spanned<Expr>, ParseError> {
    run_parser!(expression().then_ignore(end()), input, offset)
}

/// Parse `for` tag arguments
pub fn parse_for_args(input: &str, offset: usize) -> Result<ForArgs, ParseError> {
    run_parser!(for_args_parser(), input, offset)
}

/// Parse `if`/`elif` arguments: a condition with an optional `priority <expr>` suffix
pub fn parse_condition_args(
    input: &str,
    offset: usize,
) -> Result<(Spanned<Expr>, Option<Spanned<Expr>>), ParseError> {
    run_parser!(
        expression()
            .then(priority_clause().or_not())
            .then_ignore(end()),
        input,
        offset
    )
}

/// Parse `else` arguments: nothing, or `priority <expr>`
pub fn parse_else_args(input: &str, offset: usize) -> Result<Option<Spanned<Expr>>, ParseError> {
    run_parser!(priority_clause().or_not().then_ignore(end()), input, offset)
}

/// Parse `priority` tag arguments
///
/// Returns the expression and, if anything follows it, the span of the
/// leftover tokens so the tag can report them as malformed.
pub fn parse_priority_args(
    input: &str,
    offset: usize,
) -> Result<(Spanned<Expr>, Option<Span>), ParseError> {
    let trailing = any()
        .repeated()
        .at_least(1)
        .collect::<Vec<Token>>()
        .map_with(|_, e| span_range(&e.span()));

    run_parser!(
        expression().then(trailing.or_not()).then_ignore(end()),
        input,
        offset
    )
}

fn priority_clause<'a, I>() -> impl Parser<'a, I, Spanned<Expr>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    just(Token::Priority).ignore_then(expression())
}

fn for_args_parser<'a, I>() -> impl Parser<'a, I, ForArgs, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let name = select! {
        Token::Ident(s) => Identifier::new(s),
    }
    .labelled("loop variable")
    .map_with(|id, e| Spanned::new(id, span_range(&e.span())));

    name.clone()
        .then(just(Token::Comma).ignore_then(name).or_not())
        .then_ignore(just(Token::In))
        .then(expression())
        .then_ignore(end())
        .map(|((first, second), iterable)| match second {
            Some(value) => ForArgs {
                key: Some(first),
                value,
                iterable,
            },
            None => ForArgs {
                key: None,
                value: first,
                iterable,
            },
        })
}

/// Fold `first (op operand)*` into a left-associative tree
fn fold_binary(first: Spanned<Expr>, rest: Vec<(BinaryOp, Spanned<Expr>)>) -> Spanned<Expr> {
    rest.into_iter().fold(first, |lhs, (op, rhs)| {
        let span = lhs.span.start..rhs.span.end;
        Spanned::new(
            Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        )
    })
}

/// Apply prefix operators, innermost (rightmost) first
fn fold_unary(ops: Vec<(UnaryOp, Span)>, operand: Spanned<Expr>) -> Spanned<Expr> {
    ops.into_iter().rev().fold(operand, |acc, (op, op_span)| {
        let span = op_span.start..acc.span.end;
        Spanned::new(
            Expr::Unary {
                op,
                operand: Box::new(acc),
            },
            span,
        )
    })
}

pub(crate) fn expression<'a, I>(
) -> impl Parser<'a, I, Spanned<Expr>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    recursive(|expr| {
        let literal = select! {
            Token::Int(n) => Expr::Literal(Value::Int(n)),
            Token::Float(f) => Expr::Literal(Value::Float(f)),
            Token::Str(s) => Expr::Literal(Value::String(s)),
            Token::True => Expr::Literal(Value::Bool(true)),
            Token::False => Expr::Literal(Value::Bool(false)),
            Token::Nil => Expr::Literal(Value::Nil),
        };

        let variable = select! {
            Token::Ident(s) => Expr::Variable(Identifier::new(s)),
        };

        let list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(Expr::List);

        let parenthesized = expr
            .clone()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose))
            .map(|inner: Spanned<Expr>| inner.node);

        let atom = choice((literal, variable, list, parenthesized))
            .map_with(|node, e| Spanned::new(node, span_range(&e.span())))
            .labelled("expression");

        // Postfix access: `.name`, `.0`, `[expr]`. The lexer splits `.1.0`
        // into separate integers, so numeric chains work too.
        let accessor = choice((
            just(Token::Dot).ignore_then(select! {
                Token::Ident(s) => Accessor::Attr(Identifier::new(s)),
                Token::Int(n) => Accessor::Attr(Identifier::new(n.to_string())),
            }),
            expr.clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                .map(Accessor::Index),
        ))
        .map_with(|acc, e| (acc, span_range(&e.span())));

        let postfix = atom
            .then(accessor.repeated().collect::<Vec<_>>())
            .map(|(base, accessors)| {
                accessors.into_iter().fold(base, |target, (acc, acc_span)| {
                    let span = target.span.start..acc_span.end;
                    let node = match acc {
                        Accessor::Attr(name) => Expr::Attribute {
                            target: Box::new(target),
                            name,
                        },
                        Accessor::Index(index) => Expr::Index {
                            target: Box::new(target),
                            index: Box::new(index),
                        },
                    };
                    Spanned::new(node, span)
                })
            });

        let negation = just(Token::Minus)
            .to(UnaryOp::Neg)
            .map_with(|op, e| (op, span_range(&e.span())));

        let unary = negation
            .repeated()
            .collect::<Vec<_>>()
            .then(postfix)
            .map(|(ops, operand)| fold_unary(ops, operand))
            .boxed();

        let product_op = choice((
            just(Token::Star).to(BinaryOp::Mul),
            just(Token::Slash).to(BinaryOp::Div),
            just(Token::Percent).to(BinaryOp::Rem),
        ));
        let product = unary
            .clone()
            .then(product_op.then(unary).repeated().collect::<Vec<_>>())
            .map(|(first, rest)| fold_binary(first, rest));

        let sum_op = choice((
            just(Token::Plus).to(BinaryOp::Add),
            just(Token::Minus).to(BinaryOp::Sub),
        ));
        let sum = product
            .clone()
            .then(sum_op.then(product).repeated().collect::<Vec<_>>())
            .map(|(first, rest)| fold_binary(first, rest))
            .boxed();

        let comparison_op = choice((
            just(Token::EqEq).to(BinaryOp::Eq),
            just(Token::NotEq).to(BinaryOp::Ne),
            just(Token::LessOrEqual).to(BinaryOp::Le),
            just(Token::GreaterOrEqual).to(BinaryOp::Ge),
            just(Token::Less).to(BinaryOp::Lt),
            just(Token::Greater).to(BinaryOp::Gt),
            just(Token::In).to(BinaryOp::In),
        ));
        let comparison = sum
            .clone()
            .then(comparison_op.then(sum).repeated().collect::<Vec<_>>())
            .map(|(first, rest)| fold_binary(first, rest));

        // `not` binds looser than comparisons: `not a == b` is `not (a == b)`
        let not = just(Token::Not)
            .to(UnaryOp::Not)
            .map_with(|op, e| (op, span_range(&e.span())))
            .repeated()
            .collect::<Vec<_>>()
            .then(comparison)
            .map(|(ops, operand)| fold_unary(ops, operand))
            .boxed();

        let conjunction = not
            .clone()
            .then(
                just(Token::And)
                    .to(BinaryOp::And)
                    .then(not)
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(|(first, rest)| fold_binary(first, rest));

        conjunction
            .clone()
            .then(
                just(Token::Or)
                    .to(BinaryOp::Or)
                    .then(conjunction)
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(|(first, rest)| fold_binary(first, rest))
            .boxed()
    })
}
