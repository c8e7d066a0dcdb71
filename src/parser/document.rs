//! Tag-level parser
//!
//! Walks the segments produced by the lexer and builds the node tree. Block
//! tags are dispatched through the [`TagRegistry`]; their parse functions call
//! back into [`Parser::wrap_until`] to read their bodies. While a body is
//! being read the parser keeps the stack of open priority scopes and the ids
//! of the enclosing `for` loops, and every node captures a snapshot of the
//! priority stack when it is built.

use std::sync::Arc;

use crate::config::Options;
use crate::error::ParseError;
use crate::node::{Document, Node, NodeKind, NodeList};
use crate::parser::ast::{Expr, LoopId, Span, Spanned};
use crate::parser::grammar::parse_expression;
use crate::parser::lexer::{segments, Segment};
use crate::priority::{PriorityEvaluator, PriorityId, PriorityStack};
use crate::tags::TagRegistry;

/// A `{% name args %}` tag split into its name and raw arguments
#[derive(Debug, Clone, PartialEq)]
pub struct TagCall {
    pub name: String,
    /// Everything after the name, untrimmed
    pub args: String,
    /// Byte position of `args` in the template source
    pub args_offset: usize,
    /// Span of the whole tag including delimiters
    pub span: Span,
}

impl TagCall {
    fn from_segment(source: &str, offset: usize, span: Span) -> Result<Self, ParseError> {
        let trimmed = source.trim_start();
        let lead = source.len() - trimmed.len();
        let name = trimmed
            .split_whitespace()
            .next()
            .ok_or_else(|| ParseError::malformed(span.clone(), "tag name is missing"))?;

        Ok(Self {
            name: name.to_string(),
            args: trimmed[name.len()..].to_string(),
            args_offset: offset + lead + name.len(),
            span,
        })
    }

    pub fn has_args(&self) -> bool {
        !self.args.trim().is_empty()
    }

    /// Fails if the tag carries any arguments
    pub fn expect_no_args(&self) -> Result<(), ParseError> {
        if self.has_args() {
            return Err(ParseError::malformed(
                self.span.clone(),
                "arguments not allowed here",
            ));
        }
        Ok(())
    }
}

pub struct Parser<'p> {
    segments: Vec<(Segment, Span)>,
    pos: usize,
    registry: &'p TagRegistry,
    priorities: PriorityStack,
    loops: Vec<LoopId>,
    loop_count: u32,
    priority_count: u32,
    /// End of the last consumed segment
    last_end: usize,
}

impl<'p> Parser<'p> {
    pub fn new(
        source: &str,
        registry: &'p TagRegistry,
        options: &Options,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            segments: segments(source, options)?,
            pos: 0,
            registry,
            priorities: PriorityStack::new(),
            loops: Vec::new(),
            loop_count: 0,
            priority_count: 0,
            last_end: 0,
        })
    }

    /// Parse the whole template
    pub fn parse_document(mut self) -> Result<Document, ParseError> {
        let (body, stray) = self.parse_nodes(&[])?;
        if let Some(call) = stray {
            return Err(ParseError::UnexpectedTag {
                name: call.name,
                span: call.span,
            });
        }
        Ok(Document {
            body,
            loop_count: self.loop_count,
            priority_count: self.priority_count,
        })
    }

    /// Parse a tag body up to one of `end_tags`
    ///
    /// Returns the body and the tag that ended it. Reaching the end of the
    /// template first is an unclosed-block error reported at `opener`.
    pub fn wrap_until(
        &mut self,
        opener: &TagCall,
        end_tags: &[&str],
    ) -> Result<(NodeList, TagCall), ParseError> {
        match self.parse_nodes(end_tags)? {
            (body, Some(end)) => Ok((body, end)),
            (_, None) => Err(ParseError::Unclosed {
                tag: opener.name.clone(),
                span: opener.span.clone(),
                expected: end_tags.iter().map(|t| t.to_string()).collect(),
            }),
        }
    }

    /// Allocate a loop id and mark it as enclosing everything parsed until
    /// [`Parser::close_loop`]
    pub fn open_loop(&mut self) -> LoopId {
        let id = LoopId(self.loop_count);
        self.loop_count += 1;
        self.loops.push(id);
        id
    }

    pub fn close_loop(&mut self) {
        self.loops.pop();
    }

    /// Ids of the `for` loops enclosing the current position, outer to inner
    pub fn enclosing_loops(&self) -> &[LoopId] {
        &self.loops
    }

    /// Create a priority evaluator and push it; nodes parsed until
    /// [`Parser::close_priority`] capture it
    pub fn open_priority(
        &mut self,
        expr: Spanned<Expr>,
        clause_index: usize,
    ) -> Arc<PriorityEvaluator> {
        let id = PriorityId(self.priority_count);
        self.priority_count += 1;
        let evaluator = Arc::new(PriorityEvaluator::new(
            id,
            expr,
            clause_index,
            self.enclosing_loops().to_vec(),
        ));
        self.priorities.push(Arc::clone(&evaluator));
        evaluator
    }

    pub fn close_priority(&mut self, at: &TagCall) -> Result<(), ParseError> {
        self.priorities
            .pop()
            .map(|_| ())
            .ok_or_else(|| ParseError::malformed(at.span.clone(), "unbalanced priority scope"))
    }

    /// Parse sibling nodes until a tag named in `end_tags` or the end of input
    fn parse_nodes(
        &mut self,
        end_tags: &[&str],
    ) -> Result<(NodeList, Option<TagCall>), ParseError> {
        let mut nodes = Vec::new();

        while let Some((segment, span)) = self.segments.get(self.pos).cloned() {
            self.pos += 1;
            self.last_end = span.end;

            let kind = match segment {
                Segment::Text(text) => NodeKind::Text(text),
                Segment::Variable { source, offset } => {
                    NodeKind::Output(parse_expression(&source, offset)?)
                }
                Segment::Tag { source, offset } => {
                    let call = TagCall::from_segment(&source, offset, span.clone())?;
                    if end_tags.contains(&call.name.as_str()) {
                        return Ok((NodeList::new(nodes), Some(call)));
                    }
                    self.parse_tag(&call)?
                }
            };

            let node_span = span.start..self.last_end;
            nodes.push(Node::new(kind, node_span, self.priorities.snapshot()));
        }

        Ok((NodeList::new(nodes), None))
    }

    fn parse_tag(&mut self, call: &TagCall) -> Result<NodeKind, ParseError> {
        let registry = self.registry;
        match registry.get(&call.name) {
            Some(spec) => {
                tracing::trace!(tag = %call.name, span = ?call.span, "parsing tag");
                (spec.parse)(self, call)
            }
            None if registry.is_intermediate(&call.name) => {
                Err(ParseError::UnexpectedTag {
                    name: call.name.clone(),
                    span: call.span.clone(),
                })
            }
            None => Err(ParseError::UnknownTag {
                name: call.name.clone(),
                span: call.span.clone(),
            }),
        }
    }
}

/// Parse template source into a document
pub fn parse(
    source: &str,
    registry: &TagRegistry,
    options: &Options,
) -> Result<Document, ParseError> {
    Parser::new(source, registry, options)?.parse_document()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_default(source: &str) -> Result<Document, ParseError> {
        parse(source, &TagRegistry::builtin(), &Options::default())
    }

    #[test]
    fn test_tag_call_split() {
        let call = TagCall::from_segment("  for x in y ", 10, 8..23).unwrap();
        assert_eq!(call.name, "for");
        assert_eq!(call.args, " x in y ");
        assert_eq!(call.args_offset, 15);
        assert!(call.has_args());
    }

    #[test]
    fn test_empty_tag_is_malformed() {
        let err = parse_default("{%   %}").unwrap_err();
        assert!(matches!(err, ParseError::Malformed { .. }));
    }

    #[test]
    fn test_parse_text_and_output() {
        let doc = parse_default("Hello {{ name }}!").unwrap();
        let kinds: Vec<_> = doc.body.nodes().iter().map(Node::kind).collect();
        assert_eq!(kinds.len(), 3);
        assert!(matches!(kinds[0], NodeKind::Text(t) if t == "Hello "));
        assert!(matches!(kinds[1], NodeKind::Output(_)));
        assert_eq!(doc.body.nodes()[1].span(), &(6..16));
    }

    #[test]
    fn test_unknown_tag() {
        let err = parse_default("{% frobnicate %}").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownTag {
                name: "frobnicate".to_string(),
                span: 0..16
            }
        );
    }

    #[test]
    fn test_stray_end_tag() {
        let err = parse_default("a {% endfor %}").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedTag { name, .. } if name == "endfor"));
    }

    #[test]
    fn test_unclosed_block() {
        let err = parse_default("{% priority 1 %}never closed").unwrap_err();
        match err {
            ParseError::Unclosed {
                tag,
                span,
                expected,
            } => {
                assert_eq!(tag, "priority");
                assert_eq!(span, 0..16);
                assert_eq!(expected, vec!["endpriority".to_string()]);
            }
            other => panic!("Expected unclosed error, got {:?}", other),
        }
    }

    #[test]
    fn test_ids_are_sequential() {
        let doc = parse_default(
            "{% for a in x %}{% priority 1 %}{% for b in y %}{% endfor %}{% endpriority %}{% endfor %}{% priority 2 %}{% endpriority %}",
        )
        .unwrap();
        assert_eq!(doc.loop_count, 2);
        assert_eq!(doc.priority_count, 2);
    }

    #[test]
    fn test_block_node_span_covers_end_tag() {
        let source = "{% priority 1 %}x{% endpriority %}";
        let doc = parse_default(source).unwrap();
        assert_eq!(doc.body.nodes()[0].span(), &(0..source.len()));
    }

    #[test]
    fn test_snapshots_follow_nesting() {
        let doc = parse_default("{% priority 1 %}a{% priority 2 %}b{% endpriority %}{% endpriority %}c")
            .unwrap();
        let nodes = doc.body.nodes();
        // The scope node itself is outside its own scope
        assert!(nodes[0].priorities().is_empty());
        assert!(nodes[1].priorities().is_empty());

        let NodeKind::Priority(outer) = nodes[0].kind() else {
            panic!("Expected priority node");
        };
        let inner_nodes = outer.body().nodes();
        let depths: Vec<_> = inner_nodes.iter().map(|n| n.priorities().len()).collect();
        assert_eq!(depths, vec![1, 1]);

        let NodeKind::Priority(inner) = inner_nodes[1].kind() else {
            panic!("Expected nested priority node");
        };
        let ids: Vec<_> = inner.body().nodes()[0]
            .priorities()
            .iter()
            .map(|p| p.id())
            .collect();
        assert_eq!(ids, vec![PriorityId(0), PriorityId(1)]);
    }

    #[test]
    fn test_enclosing_loops_track_open_loops() {
        let registry = TagRegistry::builtin();
        let mut parser = Parser::new("", &registry, &Options::default()).unwrap();
        let outer = parser.open_loop();
        let inner = parser.open_loop();
        assert_eq!(parser.enclosing_loops(), &[outer, inner]);

        parser.close_loop();
        assert_eq!(parser.enclosing_loops(), &[LoopId(0)]);
        parser.close_loop();
        assert!(parser.enclosing_loops().is_empty());
    }

    #[test]
    fn test_priority_records_enclosing_loops() {
        let doc = parse_default(
            "{% for a in x %}{% for b in y %}{% priority 1 %}z{% endpriority %}{% endfor %}{% endfor %}",
        )
        .unwrap();
        let NodeKind::For(outer) = doc.body.nodes()[0].kind() else {
            panic!("Expected for node");
        };
        let NodeKind::For(inner) = outer.body().nodes()[0].kind() else {
            panic!("Expected nested for node");
        };
        let NodeKind::Priority(scope) = inner.body().nodes()[0].kind() else {
            panic!("Expected priority node");
        };
        assert_eq!(scope.evaluator().loop_ids(), &[LoopId(0), LoopId(1)]);
    }
}
