//! Structured selections and prompt assembly.

pub mod mapper;
pub mod prompt_builder;

pub use mapper::{GenerationTags, StructuredSelections, map_selections};
pub use prompt_builder::{PromptBuilder, PromptValidation, TemplatePromptBuilder};
