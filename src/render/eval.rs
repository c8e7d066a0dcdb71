//! Expression evaluation against an execution context

use std::cmp::Ordering;

use crate::parser::ast::{BinaryOp, Expr, Span, Spanned, UnaryOp};
use crate::value::Value;

use super::context::ExecutionContext;
use super::error::EvalError;

impl Spanned<Expr> {
    pub fn evaluate(&self, ctx: &ExecutionContext<'_>) -> Result<Value, EvalError> {
        match &self.node {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => match ctx.lookup(name.as_str()) {
                Some(value) => Ok(value),
                None if ctx.options().strict_undefined => Err(EvalError::UndefinedVariable {
                    name: name.to_string(),
                    span: self.span.clone(),
                }),
                None => Ok(Value::Nil),
            },
            Expr::List(items) => items
                .iter()
                .map(|item| item.evaluate(ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Attribute { target, name } => {
                let target = target.evaluate(ctx)?;
                Ok(attribute(&target, name.as_str()))
            }
            Expr::Index { target, index } => {
                let target = target.evaluate(ctx)?;
                let index = index.evaluate(ctx)?;
                Ok(subscript(&target, &index))
            }
            Expr::Unary { op, operand } => {
                let value = operand.evaluate(ctx)?;
                unary(*op, value, &self.span)
            }
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => {
                    let left = lhs.evaluate(ctx)?;
                    if !left.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(rhs.evaluate(ctx)?.is_truthy()))
                }
                BinaryOp::Or => {
                    let left = lhs.evaluate(ctx)?;
                    if left.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(rhs.evaluate(ctx)?.is_truthy()))
                }
                _ => {
                    let left = lhs.evaluate(ctx)?;
                    let right = rhs.evaluate(ctx)?;
                    binary(*op, left, right, &self.span)
                }
            },
        }
    }
}

fn attribute(target: &Value, name: &str) -> Value {
    match target {
        Value::Map(entries) => entries.get(name).cloned().unwrap_or_default(),
        Value::List(_) | Value::String(_) => match name.parse::<i64>() {
            Ok(i) => subscript(target, &Value::Int(i)),
            Err(_) => Value::Nil,
        },
        _ => Value::Nil,
    }
}

/// `target[index]`; out-of-range and missing keys yield nil
fn subscript(target: &Value, index: &Value) -> Value {
    match (target, index) {
        (Value::List(items), Value::Int(i)) => position(*i, items.len())
            .and_then(|i| items.get(i).cloned())
            .unwrap_or_default(),
        (Value::String(s), Value::Int(i)) => {
            let count = s.chars().count();
            position(*i, count)
                .and_then(|i| s.chars().nth(i))
                .map_or(Value::Nil, |c| Value::String(c.to_string()))
        }
        (Value::Map(entries), Value::String(key)) => {
            entries.get(key).cloned().unwrap_or_default()
        }
        _ => Value::Nil,
    }
}

/// Resolve a possibly negative index against `len`
fn position(i: i64, len: usize) -> Option<usize> {
    if i >= 0 {
        usize::try_from(i).ok()
    } else {
        len.checked_sub(usize::try_from(i.unsigned_abs()).ok()?)
    }
}

fn unary(op: UnaryOp, value: Value, span: &Span) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Neg => match value {
            Value::Int(i) => Ok(i.checked_neg().map_or(Value::Float(-(i as f64)), Value::Int)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(mismatch(
                format!("cannot negate {}", other.kind()),
                span,
            )),
        },
    }
}

fn binary(op: BinaryOp, left: Value, right: Value, span: &Span) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(left.loose_eq(&right))),
        BinaryOp::Ne => Ok(Value::Bool(!left.loose_eq(&right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(&left, &right).ok_or_else(|| {
                mismatch(
                    format!(
                        "cannot compare {} {} {}",
                        left.kind(),
                        op.symbol(),
                        right.kind()
                    ),
                    span,
                )
            })?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::In => contains(&right, &left)
            .map(Value::Bool)
            .ok_or_else(|| mismatch(format!("'in' is not supported on {}", right.kind()), span)),
        BinaryOp::Add => match (left, right) {
            (Value::String(a), b) => Ok(Value::String(format!("{}{}", a, b))),
            (a, Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (a, b) => arithmetic(op, &a, &b, span),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, &left, &right, span)
        }
        // short-circuited by the caller
        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value, span: &Span) -> Result<Value, EvalError> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        let (a, b) = (*a, *b);
        if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0 {
            return Err(EvalError::DivisionByZero { span: span.clone() });
        }
        let exact = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div if a.checked_rem(b) == Some(0) => a.checked_div(b),
            BinaryOp::Rem => a.checked_rem(b),
            _ => None,
        };
        if let Some(result) = exact {
            return Ok(Value::Int(result));
        }
    }

    let (a, b) = match (numeric(left), numeric(right)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(mismatch(
                format!(
                    "unsupported operands {} {} {}",
                    left.kind(),
                    op.symbol(),
                    right.kind()
                ),
                span,
            ))
        }
    };

    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => {
            return Err(EvalError::DivisionByZero { span: span.clone() })
        }
        BinaryOp::Div => a / b,
        _ => a % b,
    };
    Ok(Value::Float(result))
}

/// Numbers only; arithmetic does not coerce strings or booleans
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        _ => numeric(left)?.partial_cmp(&numeric(right)?),
    }
}

fn contains(haystack: &Value, needle: &Value) -> Option<bool> {
    match haystack {
        Value::List(items) => Some(items.iter().any(|item| item.loose_eq(needle))),
        Value::Map(entries) => Some(match needle {
            Value::String(key) => entries.contains_key(key),
            _ => false,
        }),
        Value::String(s) => match needle {
            Value::String(sub) => Some(s.contains(sub.as_str())),
            _ => None,
        },
        Value::Nil => Some(false),
        _ => None,
    }
}

fn mismatch(message: String, span: &Span) -> EvalError {
    EvalError::TypeMismatch {
        message,
        span: span.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::parser::parse_expression;
    use crate::value::Context;

    fn eval_with(source: &str, vars: Context, options: &Options) -> Result<Value, EvalError> {
        let expr = parse_expression(source, 0).expect("expression should parse");
        let ctx = ExecutionContext::new(options, vars, 0);
        expr.evaluate(&ctx)
    }

    fn eval(source: &str) -> Value {
        eval_with(source, Context::new(), &Options::default()).unwrap()
    }

    fn vars() -> Context {
        let mut vars = Context::new();
        vars.insert("n".to_string(), Value::Int(4));
        vars.insert("items".to_string(), Value::from(vec!["a", "b", "c"]));
        let mut user = Context::new();
        user.insert("name".to_string(), Value::from("ada"));
        vars.insert("user".to_string(), Value::Map(user));
        vars
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval("(1 + 2) * 3"), Value::Int(9));
        assert_eq!(eval("-2 + 5"), Value::Int(3));
        assert_eq!(eval("7 % 4"), Value::Int(3));
    }

    #[test]
    fn test_division() {
        assert_eq!(eval("6 / 3"), Value::Int(2));
        assert_eq!(eval("7 / 2"), Value::Float(3.5));
        let err = eval_with("1 / 0", Context::new(), &Options::default()).unwrap_err();
        assert!(matches!(err, EvalError::DivisionByZero { .. }));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(eval(r#""v" + 2"#), Value::from("v2"));
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(eval("1 < 2 and 2 <= 2"), Value::Bool(true));
        assert_eq!(eval("not 1 == 2"), Value::Bool(true));
        assert_eq!(eval("0 or none"), Value::Bool(false));
        assert_eq!(eval(r#""b" in ["a", "b"]"#), Value::Bool(true));
        assert_eq!(eval("2 == 2.0"), Value::Bool(true));
    }

    #[test]
    fn test_access() {
        let options = Options::default();
        let get = |src: &str| eval_with(src, vars(), &options).unwrap();
        assert_eq!(get("user.name"), Value::from("ada"));
        assert_eq!(get("user['name']"), Value::from("ada"));
        assert_eq!(get("items[1]"), Value::from("b"));
        assert_eq!(get("items[-1]"), Value::from("c"));
        assert_eq!(get("items.0"), Value::from("a"));
        assert_eq!(get("items[9]"), Value::Nil);
        assert_eq!(get("user.missing"), Value::Nil);
        assert_eq!(get("n * 2"), Value::Int(8));
    }

    #[test]
    fn test_undefined_variables() {
        assert_eq!(eval("missing"), Value::Nil);
        let strict = Options::default().with_strict_undefined(true);
        let err = eval_with("missing + 1", Context::new(), &strict).unwrap_err();
        assert_eq!(
            err,
            EvalError::UndefinedVariable {
                name: "missing".to_string(),
                span: 0..7
            }
        );
    }

    #[test]
    fn test_type_mismatch() {
        let err = eval_with(r#"[1] - 1"#, Context::new(), &Options::default()).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
        let err = eval_with(r#""a" < 1"#, Context::new(), &Options::default()).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }
}
