//! Prompt templates for the research protocol.
//!
//! Templates use `{{ name }}` placeholders. Built-in defaults can be replaced
//! per prompt by dropping `<prompt-id>.txt` into a prompts directory.

use crate::types::{AppError, Result};
use std::collections::HashMap;
use std::path::Path;

pub const SUFFICIENCY: &str = "assess-information-sufficiency";
pub const SELECT_CONTENT: &str = "select-content";
pub const EXTRACT_NOTES: &str = "extract-notes-from-webpages";

const ALL_IDS: [&str; 3] = [SUFFICIENCY, SELECT_CONTENT, EXTRACT_NOTES];

const DEFAULT_SUFFICIENCY: &str = "\
You are a meticulous research assistant.
You are researching the topic: {{ research_topic }}

Below are snippets of content already gathered by related research.
Decide whether it is enough to write thorough notes on the topic.
If it is not, list short, specific search topics that would fill the gaps.
If it is enough, return an empty list.

{{ formatted_content }}";

const DEFAULT_SELECT_CONTENT: &str = "\
You are a meticulous research assistant.
You are researching the topic: {{ research_topic }}

Each line below is a numbered snippet of a web page.
Pick the snippets whose pages are most relevant to the topic.
Answer with the numbers of the chosen snippets.

{{ formatted_snippets }}";

const DEFAULT_EXTRACT_NOTES: &str = "\
You are a meticulous research assistant.
You are researching the topic: {{ research_topic }}

Write bullet point notes on the topic based only on the webpages below.
Keep facts, figures and names; leave out anything unrelated to the topic.

{{ formatted_webpages }}";

/// User turn sent alongside each system prompt.
pub const SUFFICIENCY_QUESTION: &str =
    "Is the given content enough to generate the summary for the research topic?";
pub const SELECT_QUESTION: &str = "Pick the snippets you want to include in the summary.";
pub const NOTES_QUESTION: &str =
    "Generate 20 to 30 bullet point notes based on the content provided.";

#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<String, String>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        let mut templates = HashMap::new();
        templates.insert(SUFFICIENCY.to_string(), DEFAULT_SUFFICIENCY.to_string());
        templates.insert(SELECT_CONTENT.to_string(), DEFAULT_SELECT_CONTENT.to_string());
        templates.insert(EXTRACT_NOTES.to_string(), DEFAULT_EXTRACT_NOTES.to_string());
        Self { templates }
    }
}

impl PromptLibrary {
    /// Defaults, with any `<id>.txt` found in `dir` taking precedence.
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let mut library = Self::default();
        let Some(dir) = dir else {
            return Ok(library);
        };

        if !dir.is_dir() {
            return Err(AppError::Configuration(format!(
                "Prompts directory not found: {}",
                dir.display()
            )));
        }

        for id in ALL_IDS {
            let path = dir.join(format!("{}.txt", id));
            if path.is_file() {
                let template = std::fs::read_to_string(&path).map_err(|e| {
                    AppError::Configuration(format!("Failed to read {}: {}", path.display(), e))
                })?;
                tracing::debug!(prompt = id, path = %path.display(), "Loaded prompt override");
                library.templates.insert(id.to_string(), template);
            }
        }

        Ok(library)
    }

    pub fn template(&self, id: &str) -> Result<&str> {
        self.templates
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| AppError::NotFound(format!("Prompt not found: {}", id)))
    }

    /// Fill a template's placeholders. Unknown placeholders are left as-is.
    pub fn compile(&self, id: &str, vars: &[(&str, &str)]) -> Result<String> {
        Ok(fill(self.template(id)?, vars))
    }
}

fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = after[..end].trim();
        match vars.iter().find(|(key, _)| *key == name) {
            Some((_, value)) if is_identifier(name) => out.push_str(value),
            _ => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}
