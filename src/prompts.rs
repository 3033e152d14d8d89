//! Prompt templates for the language model.
//!
//! Built-in templates can be overridden by Markdown files in `prompts/`.
//! Templates use `{query}` and `{context}` placeholders.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{Error, Result};

const GROUNDED_TEMPLATE: &str = r#"The user asked: "{query}"
The knowledge graph returned related entities: {context}.
Please frame a helpful and natural answer using this context."#;

const FALLBACK_TEMPLATE: &str =
    "The knowledge graph has no answer. Based on your knowledge, answer this: {query}";

/// Separator between entity names in the grounded prompt.
pub const CONTEXT_SEPARATOR: &str = ", ";

/// Available prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Answer framed around entities found in the graph.
    Grounded,
    /// Answer from the model's own knowledge.
    Fallback,
}

impl Prompt {
    /// Override file name (Markdown).
    pub fn filename(&self) -> &'static str {
        match self {
            Prompt::Grounded => "grounded.md",
            Prompt::Fallback => "fallback.md",
        }
    }

    pub fn default_template(&self) -> &'static str {
        match self {
            Prompt::Grounded => GROUNDED_TEMPLATE,
            Prompt::Fallback => FALLBACK_TEMPLATE,
        }
    }

    /// Placeholders an override must contain to be used.
    pub fn required_placeholders(&self) -> &'static [&'static str] {
        match self {
            Prompt::Grounded => &["{query}", "{context}"],
            Prompt::Fallback => &["{query}"],
        }
    }

    /// Override from `prompts/` if present, otherwise the built-in template.
    pub fn template(&self) -> String {
        self.template_in(&prompts_dir())
    }

    /// Override from `dir` if present and usable, otherwise the built-in
    /// template. Blank overrides and overrides missing a placeholder are
    /// ignored.
    pub fn template_in(&self, dir: &Path) -> String {
        let template = match load_prompt_from(dir, self.filename()) {
            Ok(template) => template,
            Err(err) => {
                debug!("Using built-in {:?} prompt: {}", self, err);
                return self.default_template().to_string();
            }
        };

        if template.trim().is_empty() {
            return self.default_template().to_string();
        }

        let missing: Vec<&str> = self
            .required_placeholders()
            .iter()
            .copied()
            .filter(|placeholder| !template.contains(placeholder))
            .collect();
        if !missing.is_empty() {
            warn!(
                "Ignoring {} in {}: missing {}",
                self.filename(),
                dir.display(),
                missing.join(" and ")
            );
            return self.default_template().to_string();
        }

        template.trim_end().to_string()
    }
}

/// Load a prompt by file name.
pub fn load_prompt(filename: &str) -> Result<String> {
    load_prompt_from(&prompts_dir(), filename)
}

/// Load a prompt by file name from `dir`.
pub fn load_prompt_from(dir: &Path, filename: &str) -> Result<String> {
    let path = dir.join(filename);
    std::fs::read_to_string(&path)
        .map_err(|e| Error::Configuration(format!("failed to load prompt {}: {}", filename, e)))
}

/// Path to the prompts directory.
pub fn prompts_dir() -> PathBuf {
    let candidates = [PathBuf::from("prompts"), PathBuf::from("../prompts")];

    for path in candidates {
        if path.exists() {
            return path;
        }
    }

    PathBuf::from("prompts")
}

/// Prompt that grounds the answer in the matched entity names, joined in the
/// order given.
pub fn compose_grounded_prompt(query: &str, matched_names: &[String]) -> String {
    render(
        &Prompt::Grounded.template(),
        query,
        &matched_names.join(CONTEXT_SEPARATOR),
    )
}

/// Prompt used when the graph returned nothing.
pub fn compose_fallback_prompt(query: &str) -> String {
    render(&Prompt::Fallback.template(), query, "")
}

// Placeholders are only expanded in the template text, never inside the
// substituted query or entity names.
fn render(template: &str, query: &str, context: &str) -> String {
    template
        .split("{context}")
        .map(|fragment| fragment.replace("{query}", query))
        .collect::<Vec<_>>()
        .join(context)
}
