//! Secret resolution for `parameterstore_` configuration entries.
//!
//! Resolution runs exactly once while the configuration is loaded, so
//! resolvers are plain synchronous lookups.

use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::PathBuf;

/// Turns a parameter name into its secret value
pub trait ParameterResolver {
    fn resolve(&self, name: &str) -> Result<String>;
}

/// Treats the parameter name as an environment variable
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvParameterResolver;

impl ParameterResolver for EnvParameterResolver {
    fn resolve(&self, name: &str) -> Result<String> {
        std::env::var(name).map_err(|e| anyhow!("environment variable {}: {}", name, e))
    }
}

/// Treats the parameter name as a file path, relative to `root` when one is
/// set. Trailing whitespace is trimmed from the contents.
#[derive(Debug, Default, Clone)]
pub struct FileParameterResolver {
    root: Option<PathBuf>,
}

impl FileParameterResolver {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }
}

impl ParameterResolver for FileParameterResolver {
    fn resolve(&self, name: &str) -> Result<String> {
        let path = match &self.root {
            Some(root) => root.join(name.trim_start_matches('/')),
            None => PathBuf::from(name),
        };
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading secret file {}", path.display()))?;
        Ok(contents.trim_end().to_string())
    }
}

/// Fixed name to value table
impl ParameterResolver for HashMap<String, String> {
    fn resolve(&self, name: &str) -> Result<String> {
        self.get(name).cloned().ok_or_else(|| anyhow!("unknown parameter {}", name))
    }
}
