//! Detailed generation settings captured at submission time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::generation::core::errors::{GenerationError, GenerationResult};

/// Smallest number of images per request.
pub const MIN_IMAGES: u8 = 1;
/// Largest number of images per request.
pub const MAX_IMAGES: u8 = 4;
/// Maximum negative prompt length in characters.
pub const MAX_NEGATIVE_PROMPT_CHARS: usize = 500;

/// Output aspect ratio understood by the generation service.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    /// Square.
    #[default]
    #[serde(rename = "1:1")]
    Square,
    /// Portrait 3:4.
    #[serde(rename = "3:4")]
    Portrait,
    /// Landscape 4:3.
    #[serde(rename = "4:3")]
    Landscape,
    /// Tall 9:16.
    #[serde(rename = "9:16")]
    Tall,
    /// Wide 16:9.
    #[serde(rename = "16:9")]
    Wide,
}

impl AspectRatio {
    /// Wire form sent to the service.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait => "3:4",
            Self::Landscape => "4:3",
            Self::Tall => "9:16",
            Self::Wide => "16:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "1:1" => Ok(Self::Square),
            "3:4" => Ok(Self::Portrait),
            "4:3" => Ok(Self::Landscape),
            "9:16" => Ok(Self::Tall),
            "16:9" => Ok(Self::Wide),
            _ => Err(value.to_string()),
        }
    }
}

/// User-adjustable generation settings.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedSettings {
    /// Images per request, 1 to 4.
    pub number_of_images: u8,
    /// Output aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Things the service should avoid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
}

impl Default for DetailedSettings {
    fn default() -> Self {
        Self {
            number_of_images: 1,
            aspect_ratio: AspectRatio::Square,
            negative_prompt: None,
        }
    }
}

impl DetailedSettings {
    /// Validate ranges.
    ///
    /// # Errors
    /// Returns an error if the image count or negative prompt is out of range.
    pub fn validate(&self) -> GenerationResult<()> {
        if !(MIN_IMAGES..=MAX_IMAGES).contains(&self.number_of_images) {
            return Err(GenerationError::InvalidSettings(format!(
                "number_of_images must be within {MIN_IMAGES}..={MAX_IMAGES}, got {}",
                self.number_of_images
            )));
        }
        if let Some(negative) = &self.negative_prompt {
            let len = negative.chars().count();
            if len > MAX_NEGATIVE_PROMPT_CHARS {
                return Err(GenerationError::InvalidSettings(format!(
                    "negative_prompt exceeds {MAX_NEGATIVE_PROMPT_CHARS} chars ({len})"
                )));
            }
        }
        Ok(())
    }

    /// Clamp the image count and cut the negative prompt so the result
    /// always validates. Blank negative prompts become `None`.
    #[must_use]
    pub fn normalized(self) -> Self {
        self.normalized_within(MAX_IMAGES, MAX_NEGATIVE_PROMPT_CHARS)
    }

    /// Like [`normalized`](Self::normalized) but against tighter deployment
    /// limits. Limits above the hard bounds are ignored.
    #[must_use]
    pub fn normalized_within(mut self, max_images: u8, max_negative_prompt_chars: usize) -> Self {
        let max_images = max_images.clamp(MIN_IMAGES, MAX_IMAGES);
        let max_negative = max_negative_prompt_chars.min(MAX_NEGATIVE_PROMPT_CHARS);
        self.number_of_images = self.number_of_images.clamp(MIN_IMAGES, max_images);
        self.negative_prompt = self
            .negative_prompt
            .map(|text| text.chars().take(max_negative).collect::<String>())
            .filter(|text| !text.trim().is_empty());
        self
    }
}
