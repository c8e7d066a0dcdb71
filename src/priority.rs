//! Priority scopes: evaluators and the parse-time scope stack
//!
//! A `{% priority expr %}` scope (or a prioritized `if` branch) is compiled
//! into a [`PriorityEvaluator`]. Evaluators are immutable once parsing is
//! done; the value an evaluator produces in a given render is stored in that
//! render's [`ExecutionContext`], keyed by the evaluator's [`PriorityId`]. This
//! keeps a compiled template safe to render from many threads at once.
//!
//! While parsing, open scopes live on a [`PriorityStack`]. Every node copies
//! the stack when it is constructed, so it knows which scopes enclose it.

use std::sync::Arc;

use serde::Serialize;

use crate::parser::ast::{Expr, LoopId, Spanned};
use crate::render::{EvalError, ExecutionContext, ExecutionError};

/// Parse-time index of a priority evaluator within its template
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PriorityId(pub u32);

impl PriorityId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for PriorityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The compiled form of one priority declaration
#[derive(Debug)]
pub struct PriorityEvaluator {
    id: PriorityId,
    expr: Spanned<Expr>,
    clause_index: usize,
    loop_ids: Vec<LoopId>,
}

impl PriorityEvaluator {
    /// `loop_ids` lists the enclosing loops, outermost first
    pub fn new(
        id: PriorityId,
        expr: Spanned<Expr>,
        clause_index: usize,
        loop_ids: Vec<LoopId>,
    ) -> Self {
        Self {
            id,
            expr,
            clause_index,
            loop_ids,
        }
    }

    pub fn id(&self) -> PriorityId {
        self.id
    }

    pub fn expression(&self) -> &Spanned<Expr> {
        &self.expr
    }

    pub fn clause_index(&self) -> usize {
        self.clause_index
    }

    pub fn loop_ids(&self) -> &[LoopId] {
        &self.loop_ids
    }

    /// Evaluate the scope expression and record the result for this render
    ///
    /// Must run before any node inside the scope executes. Evaluating again in
    /// the same render replaces the recorded value.
    pub fn evaluate(&self, ctx: &mut ExecutionContext<'_>) -> Result<f64, ExecutionError> {
        let value = self.expr.evaluate(ctx)?;
        let priority = match value.as_number() {
            Some(priority) => priority,
            // Nil coerces to 0 outside strict mode
            None if value.is_nil() && !ctx.options().strict_undefined => 0.0,
            None => {
                return Err(EvalError::TypeMismatch {
                    message: format!("priority must be numeric, found {}", value.kind()),
                    span: self.expr.span.clone(),
                }
                .into())
            }
        };
        ctx.record_priority(self.id, priority);
        Ok(priority)
    }

    /// The value recorded by [`evaluate`](Self::evaluate) in the current render
    pub fn value(&self, ctx: &ExecutionContext<'_>) -> Result<f64, ExecutionError> {
        ctx.priority_value(self.id)
            .ok_or(ExecutionError::State { priority: self.id })
    }

    pub fn priority(&self, ctx: &ExecutionContext<'_>) -> Result<Priority<'_>, ExecutionError> {
        Ok(Priority {
            value: self.value(ctx)?,
            clause_index: self.clause_index,
            loop_ids: &self.loop_ids,
        })
    }
}

/// An evaluated priority with its loops still in abstract (id) form
#[derive(Debug, Clone, PartialEq)]
pub struct Priority<'a> {
    pub value: f64,
    pub clause_index: usize,
    pub loop_ids: &'a [LoopId],
}

/// Evaluators enclosing a node, outermost first
pub type PrioritySnapshot = Vec<Arc<PriorityEvaluator>>;

/// Stack of priority scopes open at the parser's current position
#[derive(Debug, Default)]
pub struct PriorityStack {
    scopes: Vec<Arc<PriorityEvaluator>>,
}

impl PriorityStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, evaluator: Arc<PriorityEvaluator>) {
        self.scopes.push(evaluator);
    }

    pub fn pop(&mut self) -> Option<Arc<PriorityEvaluator>> {
        self.scopes.pop()
    }

    /// Copy of the open scopes, shared with the evaluators on the stack
    pub fn snapshot(&self) -> PrioritySnapshot {
        self.scopes.clone()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
