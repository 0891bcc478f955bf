/*!
 * Prompt construction for the translation oracle.
 *
 * Batch prompts carry their payload as JSON after a fixed header so that the
 * response can be matched back by ordinal. Semantic judgments use a separate
 * constrained yes/no prompt.
 */

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;

use crate::app_config::{PathStyleGuide, TranslationCommonConfig};

/// Header preceding the JSON payload of a batch prompt
pub const BATCH_INPUT_HEADER: &str = "### INPUT JSON";

/// Headers framing the two sides of a semantic judgment prompt
pub const JUDGE_OLD_HEADER: &str = "### OLD TEXT";
pub const JUDGE_NEW_HEADER: &str = "### NEW TEXT";

const BATCH_INSTRUCTIONS: &str = r#"## Rules
- Translate only the "text" field of each item; "context_before" and "context_after" are for reference only
- Tokens like ⟦PH0⟧ stand for code, links and markup: copy every token exactly once, unchanged
- Keep line breaks inside "text" where the sentence structure allows it
- Return ONLY valid JSON: {"translations":[{"ordinal":<number>,"translated_text":"..."}]}
- Return exactly one translation per input ordinal, in any order"#;

const JUDGE_SYSTEM_PROMPT: &str = "You compare two versions of a documentation passage. Answer YES if the meaning changed in a way that requires re-translation, NO if the change is cosmetic (typos, punctuation, whitespace, formatting). Answer with exactly one word: YES or NO.";

/// System prompt template with language placeholders
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Render the template with the given variables.
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language)
    }
}

/// Style guide text loaded from the configured files
#[derive(Debug, Clone, Default)]
pub struct StyleGuides {
    base: Option<String>,
    by_prefix: Vec<(String, String)>,
}

impl StyleGuides {
    pub fn new(base: Option<String>, by_prefix: Vec<(String, String)>) -> Self {
        Self { base, by_prefix }
    }

    /// Read every configured style guide file
    pub fn load(common: &TranslationCommonConfig) -> Result<Self> {
        let base = common
            .style_guide_path
            .as_deref()
            .map(read_guide)
            .transpose()?;
        let by_prefix = common
            .path_style_guides
            .iter()
            .map(|PathStyleGuide { prefix, path }| Ok((prefix.clone(), read_guide(path)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { base, by_prefix })
    }

    /// Guide for a document path; the longest matching prefix wins
    pub fn custom_for(&self, path: &str) -> Option<&str> {
        self.by_prefix
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, guide)| guide.as_str())
    }

    /// Prompt section combining the base and path-specific guides
    pub fn section_for(&self, path: &str) -> Option<String> {
        let custom = self.custom_for(path);
        if self.base.is_none() && custom.is_none() {
            return None;
        }

        let mut section = String::from("## Style Guide\n\n");
        if let Some(base) = &self.base {
            section.push_str(base.trim());
            section.push_str("\n\n");
        }
        if let Some(custom) = custom {
            section.push_str(&format!("### Rules for {}\n\n{}\n\n", path, custom.trim()));
            section.push_str("Where these rules conflict with the general style guide, these rules win.\n\n");
        }
        Some(section)
    }
}

fn read_guide(path: &Path) -> Result<String> {
    debug!("Loading style guide {}", path.display());
    std::fs::read_to_string(path).context(format!("Failed to read style guide: {}", path.display()))
}

/// Builds system and user prompts for the oracle
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system: String,
    source_language: String,
    target_language: String,
    style_guides: StyleGuides,
}

impl PromptBuilder {
    pub fn new(template: &PromptTemplate, source_language: &str, target_language: &str, style_guides: StyleGuides) -> Self {
        Self {
            system: template.render(source_language, target_language),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            style_guides,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// User prompt for one batch; `payload` is the serialized batch request
    pub fn batch_prompt(&self, path: &str, payload: &str) -> String {
        let mut prompt = String::new();
        if let Some(section) = self.style_guides.section_for(path) {
            prompt.push_str(&section);
        }
        prompt.push_str(&format!(
            "Translate the items of the document `{}` from {} to {}.\n\n{}\n\n{}\n{}\n",
            path, self.source_language, self.target_language, BATCH_INSTRUCTIONS, BATCH_INPUT_HEADER, payload
        ));
        prompt
    }

    /// System and user prompt for a yes/no meaning-change judgment
    pub fn judge_prompt(old_text: &str, new_text: &str) -> (String, String) {
        (
            JUDGE_SYSTEM_PROMPT.to_string(),
            format!(
                "{}\n{}\n\n{}\n{}\n\nDid the meaning change? Answer YES or NO.",
                JUDGE_OLD_HEADER, old_text, JUDGE_NEW_HEADER, new_text
            ),
        )
    }
}
