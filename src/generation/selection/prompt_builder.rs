//! Prompt assembly and validation collaborators.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::generation::core::errors::GenerationResult;
use crate::generation::selection::mapper::StructuredSelections;

/// Outcome of prompt validation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptValidation {
    /// Whether the prompt may be submitted.
    pub is_valid: bool,
    /// Hint shown to the user when rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl PromptValidation {
    /// Accepted prompt.
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            is_valid: true,
            suggestion: None,
        }
    }

    /// Rejected prompt with a hint.
    #[must_use]
    pub fn invalid(suggestion: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            suggestion: Some(suggestion.into()),
        }
    }
}

/// Builds and validates the text sent to the generation service.
pub trait PromptBuilder: Send + Sync {
    /// Combine user text with structured selections.
    fn build_prompt(&self, user_text: &str, selections: &StructuredSelections) -> String;
    /// Check whether user text may be submitted.
    fn validate_prompt(&self, text: &str) -> PromptValidation;
}

/// Default builder: normalized user text followed by `category: value`
/// fragments, comma separated.
#[derive(Clone, Debug)]
pub struct TemplatePromptBuilder {
    max_chars: usize,
    whitespace: Regex,
}

impl TemplatePromptBuilder {
    /// Create a builder accepting prompts up to `max_chars` characters.
    ///
    /// # Errors
    /// Returns an error if the internal pattern fails to compile.
    pub fn new(max_chars: usize) -> GenerationResult<Self> {
        Ok(Self {
            max_chars,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    fn normalize(&self, text: &str) -> String {
        self.whitespace.replace_all(text.trim(), " ").into_owned()
    }
}

impl PromptBuilder for TemplatePromptBuilder {
    fn build_prompt(&self, user_text: &str, selections: &StructuredSelections) -> String {
        let mut out = self.normalize(user_text);
        for (category, value) in selections.iter() {
            if !out.is_empty() {
                out.push_str(", ");
            }
            out.push_str(category);
            out.push_str(": ");
            out.push_str(value);
        }
        out
    }

    fn validate_prompt(&self, text: &str) -> PromptValidation {
        let normalized = self.normalize(text);
        if normalized.is_empty() {
            return PromptValidation::invalid("生成したいキャラクターの特徴を入力してください。");
        }
        let len = normalized.chars().count();
        if len > self.max_chars {
            return PromptValidation::invalid(format!(
                "プロンプトが長すぎます（{len}文字）。{}文字以内にまとめてください。",
                self.max_chars
            ));
        }
        PromptValidation::valid()
    }
}
