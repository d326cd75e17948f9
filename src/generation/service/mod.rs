//! Remote generation service collaborator.

pub mod http;
pub mod types;

pub use http::HttpGenerationService;
pub use types::{AttachmentPayload, GeneratedReference, GenerationRequest};

use std::future::Future;
use std::pin::Pin;

use crate::generation::core::errors::GenerationResult;
use crate::generation::core::ids::ProjectId;

/// Boxed future type for service operations.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Image generation backend.
///
/// Dropping a returned future aborts the underlying request.
pub trait GenerationService: Send + Sync {
    /// Text-only generation.
    ///
    /// # Errors
    /// Returns an error if the request fails or the service rejects it.
    fn generate(
        &self,
        project_id: ProjectId,
        request: GenerationRequest,
    ) -> ServiceFuture<'_, GenerationResult<Vec<GeneratedReference>>>;

    /// Generation conditioned on uploaded images.
    ///
    /// # Errors
    /// Returns an error if the request fails or the service rejects it.
    fn generate_from_images(
        &self,
        project_id: ProjectId,
        request: GenerationRequest,
        files: Vec<AttachmentPayload>,
    ) -> ServiceFuture<'_, GenerationResult<Vec<GeneratedReference>>>;

    /// URL a client can display for a result record.
    fn display_url(&self, reference: &GeneratedReference) -> String {
        reference.image_url.clone()
    }
}
