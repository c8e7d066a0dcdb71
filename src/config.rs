//! Compile and render options
//!
//! Options can be built in code or loaded from a TOML file:
//!
//! ```toml
//! trim_blocks = true
//! lstrip_blocks = true
//! strict_undefined = false
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading options
#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("Failed to read options file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse options TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Engine behaviour switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Remove the first newline after a block tag
    pub trim_blocks: bool,

    /// Strip spaces and tabs that directly precede a block tag
    pub lstrip_blocks: bool,

    /// Treat references to undefined variables as evaluation errors instead of nil
    pub strict_undefined: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load options from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_trim_blocks(mut self, trim: bool) -> Self {
        self.trim_blocks = trim;
        self
    }

    pub fn with_lstrip_blocks(mut self, lstrip: bool) -> Self {
        self.lstrip_blocks = lstrip;
        self
    }

    pub fn with_strict_undefined(mut self, strict: bool) -> Self {
        self.strict_undefined = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = Options::default();
        assert!(!options.trim_blocks);
        assert!(!options.lstrip_blocks);
        assert!(!options.strict_undefined);
    }

    #[test]
    fn test_builder_pattern() {
        let options = Options::new()
            .with_trim_blocks(true)
            .with_lstrip_blocks(true)
            .with_strict_undefined(true);
        assert!(options.trim_blocks);
        assert!(options.lstrip_blocks);
        assert!(options.strict_undefined);
    }

    #[test]
    fn test_from_toml_partial() {
        let options = Options::from_toml("trim_blocks = true").unwrap();
        assert!(options.trim_blocks);
        assert!(!options.lstrip_blocks);
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        let err = Options::from_toml("autoescape = true").unwrap_err();
        assert!(matches!(err, OptionsError::ParseError(_)));
    }
}
