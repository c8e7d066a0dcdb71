//! Compiling templates and rendering them
//!
//! An [`Engine`] holds the tag registry, options and global variables. It
//! compiles source into a [`Template`], which is immutable and can be
//! rendered any number of times, from any thread, in five output forms.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::config::Options;
use crate::node::Document;
use crate::parser::parse;
use crate::render::{Chunk, ChunkWriter, ExecutionContext};
use crate::tags::TagRegistry;
use crate::value::{is_identifier, Context, Value};
use crate::Error;

/// Name given to templates compiled from a string
const INLINE_NAME: &str = "<string>";

#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<TagRegistry>,
    options: Options,
    globals: Context,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with the built-in tags and default options
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            registry: Arc::new(TagRegistry::builtin()),
            options,
            globals: Context::new(),
        }
    }

    /// Replace the tag registry used for subsequent compiles
    pub fn with_registry(mut self, registry: TagRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// Set a variable visible to every template compiled afterwards
    ///
    /// Templates copy the globals when they are compiled; later changes do
    /// not reach templates that already exist.
    pub fn set_global(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        if !is_identifier(name) {
            return Err(Error::Context {
                key: name.to_string(),
            });
        }
        self.globals.insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn globals(&self) -> &Context {
        &self.globals
    }

    pub fn compile(&self, source: &str) -> Result<Template, Error> {
        self.compile_named(INLINE_NAME, source)
    }

    pub fn compile_named(&self, name: &str, source: &str) -> Result<Template, Error> {
        let document = parse(source, &self.registry, &self.options)?;
        tracing::debug!(
            template = name,
            size = source.len(),
            loops = document.loop_count,
            priorities = document.priority_count,
            "compiled template"
        );

        Ok(Template {
            name: name.to_string(),
            size: source.len(),
            document: Arc::new(document),
            options: self.options.clone(),
            globals: Arc::new(self.globals.clone()),
        })
    }

    /// Compile a template file; the path becomes the template name
    pub fn compile_file(&self, path: &Path) -> Result<Template, Error> {
        let source = std::fs::read_to_string(path)?;
        self.compile_named(&path.display().to_string(), &source)
    }

    /// Compile and render in one step
    pub fn render(&self, source: &str, context: &Context) -> Result<String, Error> {
        self.compile(source)?.execute(context)
    }
}

/// A compiled template
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    /// Source length in bytes
    size: usize,
    document: Arc<Document>,
    options: Options,
    globals: Arc<Context>,
}

impl Template {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Render to a string
    pub fn execute(&self, context: &Context) -> Result<String, Error> {
        let mut writer = ChunkWriter::buffered(self.buffer_capacity());
        self.execute_into(context, &mut writer)?;
        Ok(writer.into_parts().0)
    }

    /// Render to bytes
    pub fn execute_bytes(&self, context: &Context) -> Result<Vec<u8>, Error> {
        self.execute(context).map(String::into_bytes)
    }

    /// Render to the annotated chunk sequence
    pub fn execute_chunks(&self, context: &Context) -> Result<Vec<Chunk>, Error> {
        let mut writer = ChunkWriter::buffered(self.buffer_capacity());
        self.execute_into(context, &mut writer)?;
        Ok(writer.into_chunks())
    }

    /// Render into memory, then write everything to `out`
    ///
    /// Nothing reaches `out` if rendering fails.
    pub fn execute_writer<W: Write>(&self, context: &Context, out: &mut W) -> Result<(), Error> {
        let output = self.execute(context)?;
        out.write_all(output.as_bytes())?;
        Ok(())
    }

    /// Render straight into `out` as output is produced
    ///
    /// If rendering fails partway, whatever was produced before the failure
    /// has already been written to `out` and stays there.
    pub fn execute_writer_unbuffered<W: Write>(
        &self,
        context: &Context,
        out: &mut W,
    ) -> Result<(), Error> {
        let mut writer = ChunkWriter::streaming(out);
        self.execute_into(context, &mut writer)
    }

    /// Render into a caller-owned writer
    ///
    /// Lets a host render several templates into one chunk sequence and move
    /// the writer's tracking index between them.
    pub fn execute_into(&self, context: &Context, writer: &mut ChunkWriter<'_>) -> Result<(), Error> {
        let variables = self.variables(context)?;
        let mut ctx = ExecutionContext::new(
            &self.options,
            variables,
            self.document.priority_count as usize,
        );

        tracing::debug!(template = %self.name, "rendering");
        self.document.body.execute(&mut ctx, writer).map_err(|err| {
            tracing::debug!(template = %self.name, error = %err, "render failed");
            Error::Render(err)
        })
    }

    /// Globals overlaid with the caller's context
    fn variables(&self, context: &Context) -> Result<Context, Error> {
        if let Some(key) = context.keys().find(|key| !is_identifier(key)) {
            return Err(Error::Context { key: key.clone() });
        }
        let mut variables = (*self.globals).clone();
        variables.extend(context.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(variables)
    }

    /// Output buffer size: source length plus 30%
    fn buffer_capacity(&self) -> usize {
        self.size + self.size * 3 / 10
    }
}
