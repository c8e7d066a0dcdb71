//! Template execution: contexts, expression evaluation and chunked output

mod chunk;
mod context;
mod error;
mod eval;

pub use chunk::{concat, Chunk, ChunkWriter, PriorityDetails, TrackingIndex};
pub use context::{ExecutionContext, FrameIndex, LoopFrame, LoopFrames};
pub use error::{EvalError, ExecutionError};
