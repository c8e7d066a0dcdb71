//! `{% priority expr %}` ... `{% endpriority %}`

use std::sync::Arc;

use crate::error::ParseError;
use crate::node::{NodeKind, NodeList};
use crate::parser::{parse_priority_args, Parser, TagCall};
use crate::priority::PriorityEvaluator;
use crate::render::{ChunkWriter, ExecutionContext, ExecutionError};

#[derive(Debug)]
pub struct PriorityNode {
    evaluator: Arc<PriorityEvaluator>,
    body: NodeList,
}

impl PriorityNode {
    pub fn evaluator(&self) -> &Arc<PriorityEvaluator> {
        &self.evaluator
    }

    pub fn body(&self) -> &NodeList {
        &self.body
    }

    pub fn execute(
        &self,
        ctx: &mut ExecutionContext<'_>,
        writer: &mut ChunkWriter<'_>,
    ) -> Result<(), ExecutionError> {
        self.evaluator.evaluate(ctx)?;
        self.body.execute(ctx, writer)
    }
}

pub(super) fn parse(parser: &mut Parser<'_>, call: &TagCall) -> Result<NodeKind, ParseError> {
    let (expr, trailing) = parse_priority_args(&call.args, call.args_offset)?;
    if let Some(span) = trailing {
        return Err(ParseError::malformed(span, "priority is malformed"));
    }

    let evaluator = parser.open_priority(expr, 0);
    let (body, end) = parser.wrap_until(call, &["endpriority"])?;
    parser.close_priority(&end)?;
    end.expect_no_args()?;

    Ok(NodeKind::Priority(PriorityNode { evaluator, body }))
}
