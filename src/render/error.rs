//! Error types for template execution

use thiserror::Error;

use crate::parser::ast::{LoopId, Span};
use crate::priority::PriorityId;

/// Errors raised while evaluating an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String, span: Span },

    #[error("type mismatch: {message}")]
    TypeMismatch { message: String, span: Span },

    #[error("division by zero")]
    DivisionByZero { span: Span },

    #[error("value of type {kind} is not iterable")]
    NotIterable { kind: &'static str, span: Span },
}

impl EvalError {
    pub fn span(&self) -> &Span {
        match self {
            Self::UndefinedVariable { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::DivisionByZero { span }
            | Self::NotIterable { span, .. } => span,
        }
    }
}

/// Errors that abort a render
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A priority was read before its scope evaluated it in this render
    #[error("priority {priority} was queried before being evaluated")]
    State { priority: PriorityId },

    #[error("evaluation failed: {0}")]
    Evaluation(#[from] EvalError),

    /// A priority scope references a loop that is not running
    #[error("loop iteration position not found for loop {loop_id}")]
    Resolution { loop_id: LoopId },

    /// The output sink rejected a write
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}
