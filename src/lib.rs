//! chunktmpl - a template engine whose output carries priorities
//!
//! Templates use Django-style syntax. On top of the usual `for` and `if`
//! tags, regions can be wrapped in `{% priority expr %}` scopes (or an `if`
//! branch can end in `priority expr`). Rendering can produce a sequence of
//! [`Chunk`]s in which every piece of text records the priorities of the
//! scopes around it, resolved to the loop iteration it was produced in. A
//! host can then drop or reorder low-priority content to fit a budget.
//!
//! # Example
//!
//! ```rust
//! use chunktmpl::{Context, Engine, Value};
//!
//! let template = Engine::new()
//!     .compile("{% priority 2 %}Hi {{ name }}{% endpriority %}!")
//!     .unwrap();
//!
//! let mut context = Context::new();
//! context.insert("name".to_string(), Value::from("Ada"));
//!
//! let chunks = template.execute_chunks(&context).unwrap();
//! assert_eq!(chunktmpl::concat(&chunks), "Hi Ada!");
//! assert_eq!(chunks[0].priorities()[0].value, 2.0);
//! assert!(chunks[2].priorities().is_empty());
//! ```

pub mod config;
pub mod error;
pub mod node;
pub mod parser;
pub mod priority;
pub mod render;
pub mod tags;
pub mod template;
pub mod value;

pub use config::{Options, OptionsError};
pub use error::ParseError;
pub use node::{Document, Node, NodeKind, NodeList};
pub use priority::{Priority, PriorityEvaluator, PriorityId};
pub use render::{
    concat, Chunk, ChunkWriter, EvalError, ExecutionContext, ExecutionError, PriorityDetails,
    TrackingIndex,
};
pub use tags::{TagRegistry, TagSpec};
pub use template::{Engine, Template};
pub use value::{Context, Value};

use thiserror::Error;

/// Errors that can occur while compiling or rendering a template
#[derive(Debug, Error)]
pub enum Error {
    /// Error during parsing
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error during rendering
    #[error("render error: {0}")]
    Render(#[from] ExecutionError),

    /// A context or global name that is not an identifier
    #[error("invalid context key '{key}'")]
    Context { key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("options error: {0}")]
    Options(#[from] OptionsError),
}

/// Render template source with the default engine
///
/// # Example
///
/// ```rust
/// use chunktmpl::{render, Context, Value};
///
/// let mut context = Context::new();
/// context.insert("items".to_string(), Value::from(vec!["a", "b"]));
///
/// let out = render("{% for i in items %}{{ i }};{% endfor %}", &context).unwrap();
/// assert_eq!(out, "a;b;");
/// ```
pub fn render(source: &str, context: &Context) -> Result<String, Error> {
    Engine::new().render(source, context)
}
