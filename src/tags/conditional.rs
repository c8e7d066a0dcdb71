//! `{% if %}` / `{% elif %}` / `{% else %}` / `{% endif %}`
//!
//! Every branch may end in `priority <expr>`. The branches of one chain are
//! alternatives of a single scope: a branch's clause index is its position in
//! the chain.

use std::sync::Arc;

use crate::error::ParseError;
use crate::node::{NodeKind, NodeList};
use crate::parser::ast::{Expr, Spanned};
use crate::parser::{parse_condition_args, parse_else_args, Parser, TagCall};
use crate::priority::PriorityEvaluator;
use crate::render::{ChunkWriter, ExecutionContext, ExecutionError};

#[derive(Debug)]
pub struct IfBranch {
    /// None for `else`
    pub condition: Option<Spanned<Expr>>,
    pub priority: Option<Arc<PriorityEvaluator>>,
    pub body: NodeList,
}

#[derive(Debug)]
pub struct IfNode {
    branches: Vec<IfBranch>,
}

impl IfNode {
    pub fn branches(&self) -> &[IfBranch] {
        &self.branches
    }

    pub fn execute(
        &self,
        ctx: &mut ExecutionContext<'_>,
        writer: &mut ChunkWriter<'_>,
    ) -> Result<(), ExecutionError> {
        for branch in &self.branches {
            let taken = match &branch.condition {
                Some(condition) => condition.evaluate(ctx)?.is_truthy(),
                None => true,
            };
            if taken {
                if let Some(priority) = &branch.priority {
                    priority.evaluate(ctx)?;
                }
                return branch.body.execute(ctx, writer);
            }
        }
        Ok(())
    }
}

pub(super) fn parse(parser: &mut Parser<'_>, call: &TagCall) -> Result<NodeKind, ParseError> {
    let (condition, priority) = parse_condition_args(&call.args, call.args_offset)?;
    let mut condition = Some(condition);
    let mut priority = priority;
    let mut branches = Vec::new();

    loop {
        let clause_index = branches.len();
        let evaluator = priority.map(|expr| parser.open_priority(expr, clause_index));
        let (body, next) = parser.wrap_until(call, &["elif", "else", "endif"])?;
        if evaluator.is_some() {
            parser.close_priority(&next)?;
        }

        let after_else = condition.is_none();
        branches.push(IfBranch {
            condition,
            priority: evaluator,
            body,
        });

        match next.name.as_str() {
            "endif" => {
                next.expect_no_args()?;
                break;
            }
            _ if after_else => {
                return Err(ParseError::UnexpectedTag {
                    name: next.name.clone(),
                    span: next.span.clone(),
                })
            }
            "elif" => {
                let (c, p) = parse_condition_args(&next.args, next.args_offset)?;
                condition = Some(c);
                priority = p;
            }
            _ => {
                condition = None;
                priority = parse_else_args(&next.args, next.args_offset)?;
            }
        }
    }

    Ok(NodeKind::If(IfNode { branches }))
}
