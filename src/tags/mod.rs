//! Block tags and the registry that maps tag names to their parsers

mod conditional;
mod for_loop;
mod priority_scope;

use std::collections::HashMap;

use thiserror::Error;

use crate::error::ParseError;
use crate::node::NodeKind;
use crate::parser::{Parser, TagCall};
use crate::value::is_identifier;

pub use conditional::{IfBranch, IfNode};
pub use for_loop::ForNode;
pub use priority_scope::PriorityNode;

/// Parses one tag (and its body) into a node
pub type TagParseFn = fn(&mut Parser<'_>, &TagCall) -> Result<NodeKind, ParseError>;

/// Errors that can occur while building a registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Duplicate tag definition
    #[error("duplicate tag definition: {name}")]
    Duplicate { name: String },

    /// Tag names must be identifiers
    #[error("invalid tag name: {name}")]
    InvalidName { name: String },
}

/// How a block tag is parsed
#[derive(Clone, Copy)]
pub struct TagSpec {
    pub parse: TagParseFn,
    /// Tags that only make sense inside this tag's body (`else`, `endfor`, ...)
    pub intermediates: &'static [&'static str],
}

impl std::fmt::Debug for TagSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagSpec")
            .field("intermediates", &self.intermediates)
            .finish_non_exhaustive()
    }
}

/// Registry of block tags
///
/// Built once and shared read-only by every template compiled from it.
#[derive(Debug, Default, Clone)]
pub struct TagRegistry {
    tags: HashMap<String, TagSpec>,
}

impl TagRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `for`, `if` and `priority`
    pub fn builtin() -> Self {
        let mut tags = HashMap::new();
        tags.insert(
            "for".to_string(),
            TagSpec {
                parse: for_loop::parse,
                intermediates: &["empty", "endfor"],
            },
        );
        tags.insert(
            "if".to_string(),
            TagSpec {
                parse: conditional::parse,
                intermediates: &["elif", "else", "endif"],
            },
        );
        tags.insert(
            "priority".to_string(),
            TagSpec {
                parse: priority_scope::parse,
                intermediates: &["endpriority"],
            },
        );
        Self { tags }
    }

    /// Register a tag
    pub fn register(&mut self, name: &str, spec: TagSpec) -> Result<(), RegistryError> {
        if !is_identifier(name) {
            return Err(RegistryError::InvalidName {
                name: name.to_string(),
            });
        }
        if self.tags.contains_key(name) || self.is_intermediate(name) {
            return Err(RegistryError::Duplicate {
                name: name.to_string(),
            });
        }
        self.tags.insert(name.to_string(), spec);
        Ok(())
    }

    /// Get a tag by name
    pub fn get(&self, name: &str) -> Option<&TagSpec> {
        self.tags.get(name)
    }

    /// Check if a tag exists
    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    /// Whether `name` is an intermediate or end tag of some registered tag
    pub fn is_intermediate(&self, name: &str) -> bool {
        self.tags
            .values()
            .any(|spec| spec.intermediates.contains(&name))
    }

    /// Names of all registered tags, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tags.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
