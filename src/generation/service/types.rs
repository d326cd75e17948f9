//! Wire types exchanged with the generation service.

use serde::{Deserialize, Serialize};

use crate::generation::selection::mapper::GenerationTags;

/// Body of a generation request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Assembled prompt.
    pub base_prompt: String,
    /// Tags derived from structured selections.
    pub tags: GenerationTags,
    /// Number of images.
    pub count: u8,
    /// Aspect ratio wire form, e.g. `"1:1"`.
    pub aspect_ratio: String,
    /// Optional negative prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
}

/// One generated reference image.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GeneratedReference {
    /// Service-side identifier.
    pub id: String,
    /// Public or service-relative URL.
    pub image_url: String,
    /// Storage path on the service.
    pub image_path: String,
    /// Prompt the service received.
    pub base_prompt: String,
    /// Prompt after service-side enhancement.
    pub enhanced_prompt: String,
}

/// Binary attachment uploaded with an image-conditioned request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttachmentPayload {
    /// Original file name.
    pub file_name: String,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}
