//! `reqwest` client for the reference-image REST backend.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use tracing::debug;
use url::Url;

use crate::generation::core::config::ServiceConfig;
use crate::generation::core::errors::{GenerationError, GenerationResult};
use crate::generation::core::ids::ProjectId;
use crate::generation::service::types::{
    AttachmentPayload, GeneratedReference, GenerationRequest,
};
use crate::generation::service::{GenerationService, ServiceFuture};

/// Longest error body kept from a failed response.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// HTTP implementation of [`GenerationService`].
#[derive(Clone, Debug)]
pub struct HttpGenerationService {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpGenerationService {
    /// Build the client from config.
    ///
    /// # Errors
    /// Returns an error if the base URL or API key is invalid, or the client
    /// cannot be built.
    pub fn new(config: &ServiceConfig) -> GenerationResult<Self> {
        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
                GenerationError::InvalidConfig("service.api_key is not a valid header".to_string())
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .gzip(true)
            .build()?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, project_id: ProjectId, action: &str) -> GenerationResult<Url> {
        Ok(self
            .base_url
            .join(&format!("api/projects/{project_id}/reference-images/{action}"))?)
    }

    async fn read_references(
        response: reqwest::Response,
    ) -> GenerationResult<Vec<GeneratedReference>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Service {
                status: status.as_u16(),
                body: truncate_text(&body, MAX_ERROR_BODY_CHARS),
            });
        }
        let references: Vec<GeneratedReference> = response.json().await?;
        debug!(count = references.len(), "Generation service returned references");
        Ok(references)
    }
}

impl GenerationService for HttpGenerationService {
    fn generate(
        &self,
        project_id: ProjectId,
        request: GenerationRequest,
    ) -> ServiceFuture<'_, GenerationResult<Vec<GeneratedReference>>> {
        Box::pin(async move {
            let url = self.endpoint(project_id, "generate")?;
            debug!(%url, count = request.count, "Sending text generation request");
            let response = self.client.post(url).json(&request).send().await?;
            Self::read_references(response).await
        })
    }

    fn generate_from_images(
        &self,
        project_id: ProjectId,
        request: GenerationRequest,
        files: Vec<AttachmentPayload>,
    ) -> ServiceFuture<'_, GenerationResult<Vec<GeneratedReference>>> {
        Box::pin(async move {
            let url = self.endpoint(project_id, "generate-from-images")?;
            let mut form = Form::new().text("request", serde_json::to_string(&request)?);
            let file_count = files.len();
            for file in files {
                let part = Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str(&file.mime_type)?;
                form = form.part("files", part);
            }
            debug!(%url, count = request.count, files = file_count, "Sending image generation request");
            let response = self.client.post(url).multipart(form).send().await?;
            Self::read_references(response).await
        })
    }

    fn display_url(&self, reference: &GeneratedReference) -> String {
        resolve_display_url(&self.base_url, &reference.image_url)
    }
}

/// Absolute URLs pass through; relative ones are joined onto the base.
fn resolve_display_url(base: &Url, image_url: &str) -> String {
    if Url::parse(image_url).is_ok() {
        return image_url.to_string();
    }
    base.join(image_url.trim_start_matches('/'))
        .map_or_else(|_| image_url.to_string(), String::from)
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}
