//! Per-render execution state
//!
//! An [`ExecutionContext`] is created for every render call and never shared.
//! It holds the variable scopes, the chain of running loops, and the values
//! priority scopes computed during this render.

use std::collections::BTreeMap;

use crate::config::Options;
use crate::parser::ast::LoopId;
use crate::priority::PriorityId;
use crate::value::{Context, Value};

/// Index of a frame in the context's loop arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameIndex(usize);

/// One running loop
#[derive(Debug, Clone, PartialEq)]
pub struct LoopFrame {
    pub loop_id: LoopId,
    /// Zero-based iteration counter
    pub counter0: usize,
    pub length: usize,
    /// The enclosing running loop, if any
    pub parent: Option<FrameIndex>,
}

pub struct ExecutionContext<'t> {
    options: &'t Options,
    scopes: Vec<Context>,
    frames: Vec<LoopFrame>,
    innermost: Option<FrameIndex>,
    priorities: Vec<Option<f64>>,
}

impl<'t> ExecutionContext<'t> {
    /// `priority_count` is the number of priority evaluators in the template
    pub fn new(options: &'t Options, variables: Context, priority_count: usize) -> Self {
        Self {
            options,
            scopes: vec![variables],
            frames: Vec::new(),
            innermost: None,
            priorities: vec![None; priority_count],
        }
    }

    pub fn options(&self) -> &Options {
        self.options
    }

    /// Look a variable up, innermost scope first
    ///
    /// `forloop` resolves to the state of the innermost running loop.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if name == "forloop" {
            if let Some(index) = self.innermost {
                return Some(self.forloop_value(index));
            }
        }
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Context::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Bind a variable in the innermost scope
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }

    /// Start a loop nested in the current innermost loop
    pub fn push_loop(&mut self, loop_id: LoopId, length: usize) -> FrameIndex {
        let index = FrameIndex(self.frames.len());
        self.frames.push(LoopFrame {
            loop_id,
            counter0: 0,
            length,
            parent: self.innermost,
        });
        self.innermost = Some(index);
        index
    }

    /// Move the innermost loop to iteration `counter0`
    pub fn advance_loop(&mut self, counter0: usize) {
        if let Some(FrameIndex(i)) = self.innermost {
            self.frames[i].counter0 = counter0;
        }
    }

    /// Leave the innermost loop
    pub fn pop_loop(&mut self) {
        if let Some(FrameIndex(i)) = self.innermost {
            self.innermost = self.frames[i].parent;
            self.frames.truncate(i);
        }
    }

    pub fn innermost_loop(&self) -> Option<&LoopFrame> {
        self.innermost.map(|FrameIndex(i)| &self.frames[i])
    }

    /// Running loops from the innermost outward
    pub fn loop_frames(&self) -> LoopFrames<'_> {
        LoopFrames {
            frames: &self.frames,
            next: self.innermost,
        }
    }

    /// Current iteration of `loop_id`, if that loop is running
    pub fn loop_position(&self, loop_id: LoopId) -> Option<usize> {
        self.loop_frames()
            .find(|frame| frame.loop_id == loop_id)
            .map(|frame| frame.counter0)
    }

    pub fn record_priority(&mut self, id: PriorityId, value: f64) {
        let index = id.index();
        if index >= self.priorities.len() {
            self.priorities.resize(index + 1, None);
        }
        self.priorities[index] = Some(value);
    }

    /// The value recorded for `id` in this render, if evaluated
    pub fn priority_value(&self, id: PriorityId) -> Option<f64> {
        self.priorities.get(id.index()).copied().flatten()
    }

    fn forloop_value(&self, FrameIndex(i): FrameIndex) -> Value {
        let frame = &self.frames[i];
        let mut map = BTreeMap::new();
        map.insert("counter0".to_string(), Value::from(frame.counter0));
        map.insert("counter".to_string(), Value::from(frame.counter0 + 1));
        map.insert(
            "revcounter0".to_string(),
            Value::from(frame.length.saturating_sub(frame.counter0 + 1)),
        );
        map.insert(
            "revcounter".to_string(),
            Value::from(frame.length.saturating_sub(frame.counter0)),
        );
        map.insert("first".to_string(), Value::Bool(frame.counter0 == 0));
        map.insert(
            "last".to_string(),
            Value::Bool(frame.counter0 + 1 == frame.length),
        );
        map.insert("length".to_string(), Value::from(frame.length));
        let parent = frame
            .parent
            .map_or(Value::Nil, |parent| self.forloop_value(parent));
        map.insert("parentloop".to_string(), parent);
        Value::Map(map)
    }
}

/// Iterator over the loop-frame chain, following parent links
pub struct LoopFrames<'a> {
    frames: &'a [LoopFrame],
    next: Option<FrameIndex>,
}

impl<'a> Iterator for LoopFrames<'a> {
    type Item = &'a LoopFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let FrameIndex(i) = self.next?;
        let frame = &self.frames[i];
        self.next = frame.parent;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(options: &Options) -> ExecutionContext<'_> {
        let mut vars = Context::new();
        vars.insert("name".to_string(), Value::from("outer"));
        ExecutionContext::new(options, vars, 2)
    }

    #[test]
    fn test_scopes_shadow_and_restore() {
        let options = Options::default();
        let mut ctx = ctx(&options);
        ctx.push_scope();
        ctx.set("name", Value::from("inner"));
        assert_eq!(ctx.lookup("name"), Some(Value::from("inner")));
        ctx.pop_scope();
        assert_eq!(ctx.lookup("name"), Some(Value::from("outer")));
        ctx.pop_scope();
        assert_eq!(ctx.lookup("name"), Some(Value::from("outer")));
    }

    #[test]
    fn test_loop_chain_walks_innermost_first() {
        let options = Options::default();
        let mut ctx = ctx(&options);
        ctx.push_loop(LoopId(0), 3);
        ctx.advance_loop(2);
        ctx.push_loop(LoopId(1), 4);
        ctx.advance_loop(1);

        let ids: Vec<_> = ctx.loop_frames().map(|f| f.loop_id).collect();
        assert_eq!(ids, vec![LoopId(1), LoopId(0)]);
        assert_eq!(ctx.loop_position(LoopId(0)), Some(2));
        assert_eq!(ctx.loop_position(LoopId(1)), Some(1));
        assert_eq!(ctx.loop_position(LoopId(7)), None);

        ctx.pop_loop();
        assert_eq!(ctx.innermost_loop().map(|f| f.loop_id), Some(LoopId(0)));
        assert_eq!(ctx.loop_position(LoopId(1)), None);
        ctx.pop_loop();
        assert!(ctx.innermost_loop().is_none());
    }

    #[test]
    fn test_forloop_variable() {
        let options = Options::default();
        let mut ctx = ctx(&options);
        assert_eq!(ctx.lookup("forloop"), None);

        ctx.push_loop(LoopId(0), 2);
        ctx.push_loop(LoopId(1), 3);
        ctx.advance_loop(2);

        let Some(Value::Map(forloop)) = ctx.lookup("forloop") else {
            panic!("expected forloop map");
        };
        assert_eq!(forloop["counter"], Value::Int(3));
        assert_eq!(forloop["revcounter0"], Value::Int(0));
        assert_eq!(forloop["last"], Value::Bool(true));
        let Value::Map(parent) = &forloop["parentloop"] else {
            panic!("expected parentloop map");
        };
        assert_eq!(parent["first"], Value::Bool(true));
        assert_eq!(parent["parentloop"], Value::Nil);
    }

    #[test]
    fn test_priority_table() {
        let options = Options::default();
        let mut ctx = ctx(&options);
        assert_eq!(ctx.priority_value(PriorityId(1)), None);
        ctx.record_priority(PriorityId(1), 4.0);
        assert_eq!(ctx.priority_value(PriorityId(1)), Some(4.0));
        ctx.record_priority(PriorityId(1), 6.0);
        assert_eq!(ctx.priority_value(PriorityId(1)), Some(6.0));
        assert_eq!(ctx.priority_value(PriorityId(9)), None);
    }
}
