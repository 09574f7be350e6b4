//! System prompt providers.
//!
//! A system prompt is resolved by name at the collaborator boundary. Two
//! providers ship with the core:
//!
//! - [`StaticPromptProvider`]: prompts registered in memory
//! - [`FilePromptProvider`]: `<dir>/<name>.md` (or `.txt`), read on demand
//!
//! Prompt files are trimmed; an empty file counts as missing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::PromptError;

/// Resolves a named system prompt.
pub trait SystemPromptProvider: Send + Sync {
    fn get(&self, name: &str) -> Result<String, PromptError>;
}

/// Prompts held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct StaticPromptProvider {
    prompts: HashMap<String, String>,
}

impl StaticPromptProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a prompt.
    pub fn with_prompt(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.prompts.insert(name.into(), text.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.prompts.insert(name.into(), text.into());
    }
}

impl SystemPromptProvider for StaticPromptProvider {
    fn get(&self, name: &str) -> Result<String, PromptError> {
        self.prompts
            .get(name)
            .cloned()
            .ok_or_else(|| PromptError::NotFound(name.to_string()))
    }
}

/// Well-known prompt file extensions, in lookup order.
const PROMPT_EXTENSIONS: [&str; 2] = ["md", "txt"];

/// Prompts read from a directory of markdown/text files.
#[derive(Debug, Clone)]
pub struct FilePromptProvider {
    dir: PathBuf,
}

impl FilePromptProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reject names that would escape the prompt directory.
    fn is_safe_name(name: &str) -> bool {
        !name.is_empty()
            && !name.contains(['/', '\\'])
            && name != "."
            && name != ".."
    }
}

impl SystemPromptProvider for FilePromptProvider {
    fn get(&self, name: &str) -> Result<String, PromptError> {
        if !Self::is_safe_name(name) {
            return Err(PromptError::NotFound(name.to_string()));
        }

        for ext in PROMPT_EXTENSIONS {
            let path = self.dir.join(format!("{name}.{ext}"));
            if !path.is_file() {
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|e| PromptError::Read {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
            let trimmed = content.trim();
            if trimmed.is_empty() {
                continue;
            }
            debug!(file = %path.display(), "Loaded system prompt");
            return Ok(trimmed.to_string());
        }

        Err(PromptError::NotFound(name.to_string()))
    }
}
