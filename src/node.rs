//! Executable template nodes
//!
//! Every node carries the priority scopes that enclosed it when it was
//! parsed. [`NodeList::execute`] installs those scopes on the writer before
//! running each node, so any node can be the unit of priority attribution.

use std::sync::Arc;

use crate::parser::ast::{Expr, Span, Spanned};
use crate::priority::{Priority, PriorityEvaluator, PrioritySnapshot};
use crate::render::{ChunkWriter, ExecutionContext, ExecutionError};
use crate::tags::{ForNode, IfNode, PriorityNode};

#[derive(Debug)]
pub enum NodeKind {
    /// Literal text
    Text(String),
    /// `{{ expr }}`
    Output(Spanned<Expr>),
    For(ForNode),
    If(IfNode),
    Priority(PriorityNode),
}

#[derive(Debug)]
pub struct Node {
    kind: NodeKind,
    span: Span,
    priorities: PrioritySnapshot,
}

impl Node {
    /// `priorities` is the parser's priority stack at construction time
    pub fn new(kind: NodeKind, span: Span, priorities: PrioritySnapshot) -> Self {
        Self {
            kind,
            span,
            priorities,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Enclosing priority evaluators, outermost first
    pub fn priorities(&self) -> &[Arc<PriorityEvaluator>] {
        &self.priorities
    }

    /// Evaluated priorities of the enclosing scopes, outermost first
    ///
    /// Fails with a state error if any enclosing scope has not been evaluated
    /// in this render.
    pub fn priority_stack(
        &self,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Vec<Priority<'_>>, ExecutionError> {
        self.priorities
            .iter()
            .map(|evaluator| evaluator.priority(ctx))
            .collect()
    }

    /// Run the node; the caller sets the writer's chunk context first
    pub fn execute(
        &self,
        ctx: &mut ExecutionContext<'_>,
        writer: &mut ChunkWriter<'_>,
    ) -> Result<(), ExecutionError> {
        match &self.kind {
            NodeKind::Text(text) => writer.write_chunk(text),
            NodeKind::Output(expr) => {
                let value = expr.evaluate(ctx)?;
                writer.write_chunk(&value.to_string())
            }
            NodeKind::For(node) => node.execute(ctx, writer),
            NodeKind::If(node) => node.execute(ctx, writer),
            NodeKind::Priority(node) => node.execute(ctx, writer),
        }
    }
}

/// A sequence of sibling nodes: a document body or a tag body
#[derive(Debug, Default)]
pub struct NodeList {
    nodes: Vec<Node>,
}

impl NodeList {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn execute(
        &self,
        ctx: &mut ExecutionContext<'_>,
        writer: &mut ChunkWriter<'_>,
    ) -> Result<(), ExecutionError> {
        for node in &self.nodes {
            writer.set_chunk_context(ctx, node)?;
            node.execute(ctx, writer)?;
        }
        Ok(())
    }
}

/// Root of a compiled template
#[derive(Debug)]
pub struct Document {
    pub body: NodeList,
    /// Number of `for` loops, which is also the next free loop id
    pub loop_count: u32,
    /// Number of priority evaluators, which is also the next free priority id
    pub priority_count: u32,
}
