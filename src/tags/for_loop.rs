//! `{% for [key,] value in expr %}` ... `[{% empty %} ...]` `{% endfor %}`

use crate::error::ParseError;
use crate::node::{NodeKind, NodeList};
use crate::parser::ast::{Expr, Identifier, LoopId, Spanned};
use crate::parser::{parse_for_args, Parser, TagCall};
use crate::render::{ChunkWriter, EvalError, ExecutionContext, ExecutionError};
use crate::value::Value;

#[derive(Debug)]
pub struct ForNode {
    loop_id: LoopId,
    key: Option<Identifier>,
    value: Identifier,
    iterable: Spanned<Expr>,
    body: NodeList,
    /// Rendered instead of the body when there is nothing to iterate
    empty: Option<NodeList>,
}

impl ForNode {
    pub fn loop_id(&self) -> LoopId {
        self.loop_id
    }

    pub fn body(&self) -> &NodeList {
        &self.body
    }

    pub fn empty_body(&self) -> Option<&NodeList> {
        self.empty.as_ref()
    }

    pub fn execute(
        &self,
        ctx: &mut ExecutionContext<'_>,
        writer: &mut ChunkWriter<'_>,
    ) -> Result<(), ExecutionError> {
        let iterable = self.iterable.evaluate(ctx)?;
        let entries = iterable.entries().ok_or_else(|| EvalError::NotIterable {
            kind: iterable.kind(),
            span: self.iterable.span.clone(),
        })?;

        if entries.is_empty() {
            return match &self.empty {
                Some(empty) => empty.execute(ctx, writer),
                None => Ok(()),
            };
        }

        // Maps bind their key to a lone loop variable, sequences their element
        let binds_key = matches!(iterable, Value::Map(_));

        ctx.push_loop(self.loop_id, entries.len());
        ctx.push_scope();
        let result = self.iterate(entries, binds_key, ctx, writer);
        ctx.pop_scope();
        ctx.pop_loop();
        result
    }

    fn iterate(
        &self,
        entries: Vec<(Value, Value)>,
        binds_key: bool,
        ctx: &mut ExecutionContext<'_>,
        writer: &mut ChunkWriter<'_>,
    ) -> Result<(), ExecutionError> {
        for (counter0, (key, value)) in entries.into_iter().enumerate() {
            ctx.advance_loop(counter0);
            match &self.key {
                Some(key_name) => {
                    ctx.set(key_name.as_str(), key);
                    ctx.set(self.value.as_str(), value);
                }
                None if binds_key => ctx.set(self.value.as_str(), key),
                None => ctx.set(self.value.as_str(), value),
            }
            self.body.execute(ctx, writer)?;
        }
        Ok(())
    }
}

pub(super) fn parse(parser: &mut Parser<'_>, call: &TagCall) -> Result<NodeKind, ParseError> {
    let args = parse_for_args(&call.args, call.args_offset)?;

    let loop_id = parser.open_loop();
    let (body, end) = parser.wrap_until(call, &["empty", "endfor"])?;
    parser.close_loop();
    end.expect_no_args()?;

    // The empty branch runs outside the loop
    let empty = if end.name == "empty" {
        let (empty_body, end) = parser.wrap_until(call, &["endfor"])?;
        end.expect_no_args()?;
        Some(empty_body)
    } else {
        None
    };

    Ok(NodeKind::For(ForNode {
        loop_id,
        key: args.key.map(|k| k.node),
        value: args.value.node,
        iterable: args.iterable,
        body,
        empty,
    }))
}
