//! Expression tree and parse-time identifiers for compiled templates

use serde::Serialize;

use crate::value::Value;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// AST node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Valid identifier (alphanumeric + underscore, starts with letter/_)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl Identifier {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of a `for` loop, assigned in document order at parse time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LoopId(pub u32);

impl std::fmt::Display for LoopId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Expression appearing inside `{{ ... }}` or as a tag argument
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `42`, `1.5`, `"text"`, `true`, `none`
    Literal(Value),
    /// `name`
    Variable(Identifier),
    /// `[a, b, c]`
    List(Vec<Spanned<Expr>>),
    /// `target.name`
    Attribute {
        target: Box<Spanned<Expr>>,
        name: Identifier,
    },
    /// `target[index]`
    Index {
        target: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Spanned<Expr>>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_display() {
        let id = Identifier::new("items");
        assert_eq!(id.as_str(), "items");
        assert_eq!(id.to_string(), "items");
    }

    #[test]
    fn test_loop_id_ordering() {
        let mut ids = vec![LoopId(3), LoopId(0), LoopId(1)];
        ids.sort();
        assert_eq!(ids, vec![LoopId(0), LoopId(1), LoopId(3)]);
        assert_eq!(LoopId(2).to_string(), "#2");
    }

    #[test]
    fn test_binary_op_symbols() {
        assert_eq!(BinaryOp::Le.symbol(), "<=");
        assert_eq!(BinaryOp::In.symbol(), "in");
    }
}
