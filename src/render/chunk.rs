//! Chunked output
//!
//! Rendered output is recorded as a sequence of [`Chunk`]s. Before each node
//! runs, [`ChunkWriter::set_chunk_context`] resolves the node's enclosing
//! priority scopes against the running loops; every chunk written until the
//! next call shares the resulting [`PriorityDetails`] list.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use serde::Serialize;

use crate::node::Node;
use crate::parser::ast::LoopId;

use super::context::ExecutionContext;
use super::error::ExecutionError;

/// A priority resolved to concrete loop positions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityDetails {
    pub value: f64,
    pub clause_index: usize,
    /// Iteration position of every loop the scope sits in
    pub loops: BTreeMap<LoopId, usize>,
}

/// Optional caller-supplied marker carried by chunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackingIndex {
    pub index: usize,
    pub set: bool,
}

/// An immutable fragment of rendered output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    text: String,
    priorities: Arc<[PriorityDetails]>,
    tracking_index: TrackingIndex,
}

impl Chunk {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Enclosing priorities, outermost first
    pub fn priorities(&self) -> &[PriorityDetails] {
        &self.priorities
    }

    /// Whether two chunks were stamped from the same resolved context
    pub fn shares_priorities_with(&self, other: &Chunk) -> bool {
        Arc::ptr_eq(&self.priorities, &other.priorities)
    }

    pub fn tracking_index(&self) -> TrackingIndex {
        self.tracking_index
    }
}

/// Join chunk texts into the plain rendered output
pub fn concat(chunks: &[Chunk]) -> String {
    chunks.iter().map(Chunk::text).collect()
}

/// Where chunk text goes besides the chunk list
enum Sink<'w> {
    Buffer(String),
    Stream(&'w mut dyn Write),
}

/// Accumulates stamped chunks and forwards their text to a sink
pub struct ChunkWriter<'w> {
    chunks: Vec<Chunk>,
    priorities: Arc<[PriorityDetails]>,
    tracking_index: TrackingIndex,
    sink: Sink<'w>,
}

impl ChunkWriter<'static> {
    /// Writer that keeps output in memory
    pub fn buffered(capacity: usize) -> Self {
        Self::with_sink(Sink::Buffer(String::with_capacity(capacity)))
    }
}

impl Default for ChunkWriter<'static> {
    fn default() -> Self {
        Self::buffered(0)
    }
}

impl<'w> ChunkWriter<'w> {
    /// Writer that forwards text to `sink` as soon as it is produced
    ///
    /// Bytes already forwarded cannot be taken back if the render fails later.
    pub fn streaming(sink: &'w mut dyn Write) -> Self {
        Self::with_sink(Sink::Stream(sink))
    }

    fn with_sink(sink: Sink<'w>) -> Self {
        Self {
            chunks: Vec::new(),
            priorities: Arc::from(Vec::new()),
            tracking_index: TrackingIndex::default(),
            sink,
        }
    }

    /// Resolve `node`'s priorities against the running loops and stamp
    /// subsequent chunks with them
    pub fn set_chunk_context(
        &mut self,
        ctx: &ExecutionContext<'_>,
        node: &Node,
    ) -> Result<(), ExecutionError> {
        let stack = node.priority_stack(ctx)?;
        if stack.is_empty() && self.priorities.is_empty() {
            return Ok(());
        }

        let mut resolved = Vec::with_capacity(stack.len());
        for priority in stack {
            let mut loops = BTreeMap::new();
            for &loop_id in priority.loop_ids {
                let position = ctx.loop_position(loop_id).ok_or_else(|| {
                    tracing::warn!(%loop_id, "priority scope references a loop that is not running");
                    ExecutionError::Resolution { loop_id }
                })?;
                loops.insert(loop_id, position);
            }
            resolved.push(PriorityDetails {
                value: priority.value,
                clause_index: priority.clause_index,
                loops,
            });
        }

        tracing::trace!(depth = resolved.len(), span = ?node.span(), "chunk context");
        self.priorities = Arc::from(resolved);
        Ok(())
    }

    pub fn set_tracking_index(&mut self, index: usize) {
        self.tracking_index = TrackingIndex { index, set: true };
    }

    pub fn unset_tracking_index(&mut self) {
        self.tracking_index.set = false;
    }

    /// Append a chunk stamped with the current context and forward its text
    pub fn write_chunk(&mut self, text: &str) -> Result<(), ExecutionError> {
        if text.is_empty() {
            return Ok(());
        }

        match &mut self.sink {
            Sink::Buffer(buf) => buf.push_str(text),
            Sink::Stream(w) => w.write_all(text.as_bytes())?,
        }

        self.chunks.push(Chunk {
            text: text.to_string(),
            priorities: Arc::clone(&self.priorities),
            tracking_index: self.tracking_index,
        });
        Ok(())
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Buffered output, or None for a streaming writer
    pub fn output(&self) -> Option<&str> {
        match &self.sink {
            Sink::Buffer(buf) => Some(buf),
            Sink::Stream(_) => None,
        }
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }

    /// Buffered output and chunks; streaming writers return an empty string
    pub fn into_parts(self) -> (String, Vec<Chunk>) {
        let output = match self.sink {
            Sink::Buffer(buf) => buf,
            Sink::Stream(_) => String::new(),
        };
        (output, self.chunks)
    }
}
