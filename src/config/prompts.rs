//! Prompt templates for Klipp.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub generation: GenerationPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationPrompts {
    pub system: String,
    pub user: String,
}

impl Default for GenerationPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an assistant that answers questions about video content.

You are given a set of clips retrieved from the user's video library. Each clip has a time range, an optional transcript of what is said, and a coarse description of its visual content.

Guidelines:
- Base your answer only on the provided clips
- Refer to clips by their number and time range when citing them
- If the clips do not contain the answer, say so plainly
- Keep the answer concise"#
                .to_string(),

            user: r#"Analyze the video content and answer the question.

Context:
{{context}}

Question: {{question}}

Answer:"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let generation_path = custom_path.join("generation.toml");
            if generation_path.exists() {
                let content = std::fs::read_to_string(&generation_path)?;
                prompts.generation = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
