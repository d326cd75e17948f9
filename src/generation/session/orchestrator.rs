//! Job orchestrator: validates submissions, drives the job lifecycle, and
//! reconciles service results into the conversation.
//!
//! At most one request is in flight. A submission is split in two steps:
//! [`GenerationSession::begin`] performs every synchronous effect (job
//! creation, prompt message, attachment hand-off, progress ticker) and
//! [`PendingGeneration::run`] awaits the service and settles the job. The
//! prompt message therefore always exists before the network call starts.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::generation::attachments::{DisplayHandle, HandleArena};
use crate::generation::conversation::GenerationStats;
use crate::generation::core::config::{JobConfig, LimitConfig, StudioConfig};
use crate::generation::core::errors::{GenerationError, GenerationResult};
use crate::generation::core::ids::{JobId, MessageId, ProjectId};
use crate::generation::core::job::{GenerationJob, JobEvent};
use crate::generation::core::message::{Message, MessageKind};
use crate::generation::core::settings::DetailedSettings;
use crate::generation::jobs::{JobFactory, ProgressEstimator};
use crate::generation::selection::{PromptBuilder, TemplatePromptBuilder, map_selections};
use crate::generation::service::{
    AttachmentPayload, GeneratedReference, GenerationRequest, GenerationService,
};
use crate::generation::session::state::{SessionSnapshot, SessionState};

/// Why a submission was not started. Nothing is recorded for any of them.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SubmitRefusal {
    /// Prompt text is blank.
    EmptyPrompt,
    /// Prompt validator rejected the text.
    InvalidPrompt {
        /// Validator hint.
        suggestion: Option<String>,
    },
    /// Another job is generating.
    Busy,
    /// No project is selected.
    NoProject,
    /// `regenerate` named a message that is not a prompt in the log.
    UnknownMessage,
    /// The job could not be created.
    Internal {
        /// Error text.
        detail: String,
    },
}

/// Result of a submission once it has settled.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Service returned images.
    Completed {
        /// Job identifier.
        job_id: JobId,
        /// Response message appended to the log.
        message_id: MessageId,
        /// Number of images returned.
        images: usize,
    },
    /// User cancelled the request.
    Cancelled {
        /// Job identifier.
        job_id: JobId,
    },
    /// Service or network failure.
    Failed {
        /// Job identifier.
        job_id: JobId,
        /// Underlying error text.
        error: String,
        /// Whether resubmitting may succeed.
        retryable: bool,
    },
    /// Submission was not started.
    Refused(SubmitRefusal),
}

/// Orchestrates generation jobs for one chat session.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct GenerationSession {
    state: Arc<Mutex<SessionState>>,
    service: Arc<dyn GenerationService>,
    prompt_builder: Arc<dyn PromptBuilder>,
    arena: Arc<HandleArena>,
    factory: JobFactory,
    jobs: JobConfig,
    limits: LimitConfig,
}

impl GenerationSession {
    /// Create a session using the default prompt builder.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &StudioConfig, service: Arc<dyn GenerationService>) -> GenerationResult<Self> {
        config.validate()?;
        let prompt_builder = Arc::new(TemplatePromptBuilder::new(config.limits.max_prompt_chars)?);
        let arena = Arc::new(HandleArena::new());
        let state = SessionState::new(
            Arc::clone(&arena),
            config.limits.max_attachments,
            config.project_id,
        );

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            service,
            prompt_builder,
            arena,
            factory: JobFactory::new(&config.jobs),
            jobs: config.jobs.clone(),
            limits: config.limits.clone(),
        })
    }

    /// Replace the prompt builder collaborator.
    #[must_use]
    pub fn with_prompt_builder(mut self, prompt_builder: Arc<dyn PromptBuilder>) -> Self {
        self.prompt_builder = prompt_builder;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blob arena backing attachment handles.
    #[must_use]
    pub fn arena(&self) -> Arc<HandleArena> {
        Arc::clone(&self.arena)
    }

    // ===== Submission =======================================================

    /// Submit `text` and wait for the job to settle.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        match self.begin(text) {
            Ok(pending) => pending.run().await,
            Err(refusal) => SubmitOutcome::Refused(refusal),
        }
    }

    /// Resubmit the text of a previous prompt message as a new job.
    pub async fn regenerate(&self, message_id: MessageId) -> SubmitOutcome {
        match self.begin_regenerate(message_id) {
            Ok(pending) => pending.run().await,
            Err(refusal) => SubmitOutcome::Refused(refusal),
        }
    }

    /// Look up a prompt message and start a new job from its text.
    ///
    /// # Errors
    /// Returns a refusal if the message is unknown or the submission guards
    /// reject it.
    pub fn begin_regenerate(&self, message_id: MessageId) -> Result<PendingGeneration, SubmitRefusal> {
        let text = self
            .lock()
            .conversation
            .find_prompt(message_id)
            .and_then(|message| message.text.clone())
            .ok_or(SubmitRefusal::UnknownMessage)?;
        self.begin(&text)
    }

    /// Start a job: validate, record the prompt, hand off attachments, and
    /// start the progress ticker. The service call happens in
    /// [`PendingGeneration::run`]. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// Returns a refusal when a submission guard fails; nothing is recorded.
    pub fn begin(&self, text: &str) -> Result<PendingGeneration, SubmitRefusal> {
        if text.trim().is_empty() {
            return Err(SubmitRefusal::EmptyPrompt);
        }
        let validation = self.prompt_builder.validate_prompt(text);
        if !validation.is_valid {
            warn!(suggestion = ?validation.suggestion, "Prompt rejected by validator");
            return Err(SubmitRefusal::InvalidPrompt {
                suggestion: validation.suggestion,
            });
        }

        let mut state = self.lock();
        if state.is_loading || state.registry.has_generating() {
            return Err(SubmitRefusal::Busy);
        }
        let Some(project_id) = state.project_id else {
            return Err(SubmitRefusal::NoProject);
        };

        let assembled = self.prompt_builder.build_prompt(text, &state.selections);
        let tags = map_selections(&state.selections);
        let job = self
            .factory
            .create(assembled, &state.settings)
            .map_err(|err| {
                error!(%err, "Failed to create generation job");
                SubmitRefusal::Internal {
                    detail: err.to_string(),
                }
            })?;
        let job_id = job.id;

        let request = GenerationRequest {
            base_prompt: job.prompt.clone(),
            tags,
            count: job.settings.number_of_images,
            aspect_ratio: job.settings.aspect_ratio.as_str().to_string(),
            negative_prompt: job.settings.negative_prompt.clone(),
        };

        let (handles, files) = state.attachments.take_for_submission();
        let prompt_message = Message::prompt(
            text,
            &job,
            handles.into_iter().map(String::from).collect(),
        );
        let estimated_ms = job.estimated_duration_ms;

        state.registry.insert(job);
        state.conversation.append(prompt_message);
        state.prompt.clear();
        state.is_loading = true;
        let token = state.cancellation.begin();

        let ticker_state = Arc::clone(&self.state);
        let ticker = ProgressEstimator::new(
            self.jobs.progress_tick(),
            estimated_ms,
            self.jobs.progress_cap,
        )
        .spawn(Instant::now(), move |value| {
            let mut shared = ticker_state.lock().unwrap_or_else(PoisonError::into_inner);
            shared.registry.get_mut(job_id).is_some_and(|tracked| {
                tracked.record_progress(value);
                !tracked.state.is_terminal()
            })
        });
        state.registry.attach_progress_timer(job_id, ticker.abort_handle());
        drop(state);

        info!(
            %job_id,
            %project_id,
            images = request.count,
            attachments = files.len(),
            "Generation job started"
        );

        Ok(PendingGeneration {
            session: self.clone(),
            job_id,
            project_id,
            request: Some(request),
            files,
            token,
            settled: false,
        })
    }

    /// Abort the in-flight request. Returns `false` when nothing is in
    /// flight.
    pub fn cancel(&self) -> bool {
        let cancelled = self.lock().cancellation.cancel();
        if cancelled {
            info!("Cancellation requested");
        }
        cancelled
    }

    fn settle(
        &self,
        job_id: JobId,
        result: GenerationResult<Vec<GeneratedReference>>,
    ) -> SubmitOutcome {
        let now = Utc::now();
        let mut state = self.lock();
        state.registry.stop_progress_timer(job_id);
        state.is_loading = false;
        state.cancellation.finish();

        let Some(job) = state.registry.get_mut(job_id) else {
            warn!(%job_id, "Settled job missing from registry");
            let err = GenerationError::UnknownJob(job_id);
            return SubmitOutcome::Failed {
                job_id,
                retryable: err.is_retryable(),
                error: err.to_string(),
            };
        };

        let event = match &result {
            Ok(_) => JobEvent::Succeed,
            Err(err) if err.is_cancellation() => JobEvent::Abort,
            Err(_) => JobEvent::Fail,
        };
        if let Err(err) = job.apply(event, now) {
            warn!(%job_id, %err, "Ignoring job event");
        }
        let elapsed_ms = job
            .elapsed_ms()
            .and_then(|ms| u64::try_from(ms).ok())
            .unwrap_or(0);

        let (message, outcome) = match result {
            Ok(references) => {
                let images: Vec<String> = references
                    .iter()
                    .map(|reference| self.service.display_url(reference))
                    .collect();
                let count = images.len();
                let message = Message::response(job, images, references, elapsed_ms);
                info!(%job_id, images = count, elapsed_ms, "Generation completed");
                let outcome = SubmitOutcome::Completed {
                    job_id,
                    message_id: message.id,
                    images: count,
                };
                (message, outcome)
            }
            Err(err) if err.is_cancellation() => {
                info!(%job_id, "Generation cancelled by user");
                (Message::cancelled(job), SubmitOutcome::Cancelled { job_id })
            }
            Err(err) => {
                let retryable = err.is_retryable();
                error!(%job_id, %err, retryable, elapsed_ms, "Generation failed");
                let detail = err.to_string();
                (
                    Message::failure(job, detail.clone()),
                    SubmitOutcome::Failed {
                        job_id,
                        error: detail,
                        retryable,
                    },
                )
            }
        };

        if event == JobEvent::Succeed {
            state.conversation.append_result(message);
        } else {
            state.conversation.append(message);
        }

        match Handle::try_current() {
            Ok(runtime) => {
                let cleanup_state = Arc::clone(&self.state);
                let delay = self.jobs.cleanup_delay();
                let cleanup = runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let mut shared = cleanup_state.lock().unwrap_or_else(PoisonError::into_inner);
                    shared.registry.remove(job_id);
                });
                state.registry.attach_cleanup_timer(job_id, cleanup.abort_handle());
            }
            Err(_) => {
                state.registry.remove(job_id);
            }
        }

        outcome
    }

    // ===== Conversation =====================================================

    /// Empty the conversation; `clear_history` also drops statistics
    /// history. Attachment blobs shown by the removed prompts are freed.
    pub fn clear(&self, clear_history: bool) {
        let removed = self.lock().conversation.clear(clear_history);
        let released = removed
            .iter()
            .filter(|message| message.kind == MessageKind::Prompt)
            .flat_map(|message| message.images.iter())
            .filter(|image| self.arena.discard(&DisplayHandle::parse(image.as_str())))
            .count();
        debug!(released, clear_history, "Conversation cleared");
    }

    /// Conversation in display order.
    #[must_use]
    pub fn conversation(&self) -> Vec<Message> {
        self.lock().conversation.messages().to_vec()
    }

    /// Jobs currently tracked, including settled ones inside their grace
    /// window.
    #[must_use]
    pub fn generation_queue(&self) -> Vec<GenerationJob> {
        self.lock().registry.snapshot()
    }

    /// Aggregate statistics.
    #[must_use]
    pub fn get_stats(&self) -> GenerationStats {
        let state = self.lock();
        GenerationStats::compute(
            state.conversation.history(),
            state.registry.generating_count(),
        )
    }

    /// Whether a request is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().is_loading
    }

    /// Serializable view of the editable fields.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    // ===== Editable inputs ==================================================

    /// Replace the draft prompt.
    pub fn set_prompt(&self, text: impl Into<String>) {
        self.lock().prompt = text.into();
    }

    /// Replace the detailed settings, clamped into the configured limits.
    /// In-flight jobs keep their snapshot.
    pub fn set_settings(&self, settings: DetailedSettings) -> DetailedSettings {
        let settings = settings.normalized_within(
            self.limits.max_images,
            self.limits.max_negative_prompt_chars,
        );
        self.lock().settings = settings.clone();
        settings
    }

    /// Choose one option for a category, replacing the previous choice.
    pub fn select_option(&self, category: impl Into<String>, value: impl Into<String>) {
        self.lock().selections.select(category, value);
    }

    /// Unselect a category.
    pub fn deselect(&self, category: &str) {
        self.lock().selections.deselect(category);
    }

    /// Unselect every category.
    pub fn clear_selections(&self) {
        self.lock().selections.clear();
    }

    /// Select or unselect the project.
    pub fn set_project(&self, project_id: Option<ProjectId>) {
        self.lock().project_id = project_id;
    }

    // ===== Attachments ======================================================

    /// Stage files for the next submission.
    pub fn add_attachments(&self, files: Vec<AttachmentPayload>) -> Vec<DisplayHandle> {
        self.lock().attachments.add(files)
    }

    /// Stage a file that is already displayed from `url`, such as an
    /// existing reference image. Its handle is never released locally.
    pub fn add_hosted_attachment(
        &self,
        url: impl Into<String>,
        file: AttachmentPayload,
    ) -> Option<DisplayHandle> {
        self.lock().attachments.add_hosted(url, file)
    }

    /// Remove one staged attachment; out-of-range indices are ignored.
    pub fn remove_attachment(&self, index: usize) -> bool {
        self.lock().attachments.remove(index)
    }

    /// Remove every staged attachment.
    pub fn clear_attachments(&self) {
        self.lock().attachments.clear();
    }

    /// Staged attachment handles.
    #[must_use]
    pub fn attachments(&self) -> Vec<DisplayHandle> {
        self.lock().attachments.handles().to_vec()
    }
}

/// A started job awaiting its service call.
///
/// Dropping it before [`run`](Self::run) finishes settles the job as a
/// failure so the session never stays stuck in the loading state.
pub struct PendingGeneration {
    session: GenerationSession,
    job_id: JobId,
    project_id: ProjectId,
    request: Option<GenerationRequest>,
    files: Vec<AttachmentPayload>,
    token: CancellationToken,
    settled: bool,
}

impl PendingGeneration {
    /// Identifier of the started job.
    #[must_use]
    pub const fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Issue the service call and settle the job.
    pub async fn run(mut self) -> SubmitOutcome {
        let files = std::mem::take(&mut self.files);
        let result = match self.request.take() {
            Some(request) => {
                let service = Arc::clone(&self.session.service);
                let call = if files.is_empty() {
                    service.generate(self.project_id, request)
                } else {
                    service.generate_from_images(self.project_id, request, files)
                };
                tokio::select! {
                    biased;
                    () = self.token.cancelled() => Err(GenerationError::Cancelled),
                    result = call => result,
                }
            }
            None => Err(GenerationError::UnknownJob(self.job_id)),
        };

        self.settled = true;
        self.session.settle(self.job_id, result)
    }
}

impl Drop for PendingGeneration {
    fn drop(&mut self) {
        if !self.settled {
            self.session.settle(self.job_id, Err(GenerationError::Interrupted));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;
    use crate::generation::core::job::JobState;
    use crate::generation::core::message::{CANCELLED_TEXT, ErrorKind, FAILURE_TEXT};
    use crate::generation::core::settings::AspectRatio;
    use crate::generation::selection::{PromptValidation, StructuredSelections};
    use crate::generation::service::ServiceFuture;

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Text(GenerationRequest),
        Images(GenerationRequest, usize),
    }

    /// Scripted service: records calls, optionally waits for a release
    /// signal, then pops the next scripted result.
    #[derive(Default)]
    struct FakeService {
        calls: Mutex<Vec<Call>>,
        results: Mutex<VecDeque<GenerationResult<Vec<GeneratedReference>>>>,
        gate: Option<Arc<Notify>>,
        started: AtomicUsize,
    }

    impl FakeService {
        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::default()
            }
        }

        fn push(&self, result: GenerationResult<Vec<GeneratedReference>>) {
            self.results.lock().unwrap().push_back(result);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn respond(&self, count: u8) -> ServiceFuture<'_, GenerationResult<Vec<GeneratedReference>>> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                self.results
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Ok(references(count)))
            })
        }
    }

    impl GenerationService for FakeService {
        fn generate(
            &self,
            _project_id: ProjectId,
            request: GenerationRequest,
        ) -> ServiceFuture<'_, GenerationResult<Vec<GeneratedReference>>> {
            let count = request.count;
            self.calls.lock().unwrap().push(Call::Text(request));
            self.respond(count)
        }

        fn generate_from_images(
            &self,
            _project_id: ProjectId,
            request: GenerationRequest,
            files: Vec<AttachmentPayload>,
        ) -> ServiceFuture<'_, GenerationResult<Vec<GeneratedReference>>> {
            let count = request.count;
            self.calls.lock().unwrap().push(Call::Images(request, files.len()));
            self.respond(count)
        }
    }

    fn references(count: u8) -> Vec<GeneratedReference> {
        (0..count)
            .map(|i| GeneratedReference {
                id: format!("ref-{i}"),
                image_url: format!("https://cdn.example/ref-{i}.png"),
                image_path: format!("refs/ref-{i}.png"),
                base_prompt: "base".to_string(),
                enhanced_prompt: "enhanced".to_string(),
            })
            .collect()
    }

    fn payload(name: &str) -> AttachmentPayload {
        AttachmentPayload {
            file_name: name.to_string(),
            mime_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        }
    }

    fn session_with(service: Arc<FakeService>) -> GenerationSession {
        let config = StudioConfig::new().with_project(ProjectId::new());
        GenerationSession::new(&config, service).unwrap()
    }

    async fn wait_until_started(service: &FakeService, calls: usize) {
        while service.started.load(Ordering::SeqCst) < calls {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_text_submission_completes() {
        let service = Arc::new(FakeService::default());
        let session = session_with(Arc::clone(&service));
        session.set_settings(DetailedSettings {
            number_of_images: 2,
            aspect_ratio: AspectRatio::Square,
            negative_prompt: None,
        });

        let outcome = session.submit("剣を構えるファンタジー少女").await;
        assert!(matches!(outcome, SubmitOutcome::Completed { images: 2, .. }));

        let calls = service.calls();
        assert_eq!(calls.len(), 1);
        let Call::Text(request) = &calls[0] else {
            panic!("expected text-only call");
        };
        assert_eq!(request.count, 2);
        assert_eq!(request.aspect_ratio, "1:1");

        let conversation = session.conversation();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[0].kind, MessageKind::Prompt);
        assert_eq!(conversation[1].kind, MessageKind::Response);
        assert_eq!(conversation[1].images.len(), 2);
        assert_eq!(conversation[1].metadata.results.len(), 2);
        assert!(!session.is_loading());

        let queue = session.generation_queue();
        assert_eq!(queue[0].state, JobState::Completed);
        assert_eq!(queue[0].progress, Some(100.0));
    }

    #[tokio::test]
    async fn test_attachments_use_image_endpoint() {
        let gate = Arc::new(Notify::new());
        let service = Arc::new(FakeService::gated(Arc::clone(&gate)));
        let session = session_with(Arc::clone(&service));
        let handles = session.add_attachments(vec![payload("a.png"), payload("b.png")]);

        let pending = session.begin("参考画像から生成").unwrap();
        assert!(session.attachments().is_empty());
        let prompt = &session.conversation()[0];
        let expected: Vec<String> = handles.iter().map(ToString::to_string).collect();
        assert_eq!(prompt.images, expected);

        let task = tokio::spawn(pending.run());
        wait_until_started(&service, 1).await;
        gate.notify_one();
        task.await.unwrap();

        assert!(matches!(service.calls()[0], Call::Images(_, 2)));
        assert_eq!(session.arena().live_count(), 2);
    }

    #[tokio::test]
    async fn test_single_flight() {
        let gate = Arc::new(Notify::new());
        let service = Arc::new(FakeService::gated(Arc::clone(&gate)));
        let session = session_with(Arc::clone(&service));

        let first = session.begin("one").unwrap();
        let task = tokio::spawn(first.run());
        for _ in 0..5 {
            assert_eq!(
                session.submit("again").await,
                SubmitOutcome::Refused(SubmitRefusal::Busy)
            );
        }
        wait_until_started(&service, 1).await;
        gate.notify_one();
        task.await.unwrap();

        assert_eq!(service.calls().len(), 1);
        assert_eq!(session.conversation().len(), 2);
        assert!(session.begin("next").is_ok());
    }

    #[tokio::test]
    async fn test_cancel_mid_flight() {
        let gate = Arc::new(Notify::new());
        let service = Arc::new(FakeService::gated(gate));
        let session = session_with(Arc::clone(&service));

        let pending = session.begin("キャンセルされるプロンプト").unwrap();
        let task = tokio::spawn(pending.run());
        wait_until_started(&service, 1).await;
        assert!(session.is_loading());
        assert!(session.cancel());

        let outcome = task.await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Cancelled { .. }));
        assert!(!session.is_loading());
        assert!(!session.cancel());

        let conversation = session.conversation();
        assert_eq!(conversation[0].text.as_deref(), Some("キャンセルされるプロンプト"));
        assert_eq!(conversation[1].text.as_deref(), Some(CANCELLED_TEXT));
        assert_eq!(
            conversation[1].metadata.error.as_ref().map(|e| e.kind),
            Some(ErrorKind::Cancelled)
        );
        assert_eq!(session.generation_queue()[0].state, JobState::Failed);
        assert_eq!(session.get_stats().total_generations, 0);
    }

    #[tokio::test]
    async fn test_service_failure_is_generic() {
        let service = Arc::new(FakeService::default());
        service.push(Err(GenerationError::Service {
            status: 502,
            body: "upstream exploded".to_string(),
        }));
        let session = session_with(Arc::clone(&service));

        let outcome = session.submit("失敗するプロンプト").await;
        assert!(matches!(outcome, SubmitOutcome::Failed { retryable: true, .. }));

        let conversation = session.conversation();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[0].text.as_deref(), Some("失敗するプロンプト"));
        let response = &conversation[1];
        assert_eq!(response.text.as_deref(), Some(FAILURE_TEXT));
        let error = response.metadata.error.as_ref().unwrap();
        assert_eq!(error.kind, ErrorKind::Service);
        assert!(error.detail.as_deref().unwrap().contains("upstream exploded"));
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_guards_are_silent() {
        let service = Arc::new(FakeService::default());
        let session = session_with(Arc::clone(&service));

        assert_eq!(
            session.submit("   ").await,
            SubmitOutcome::Refused(SubmitRefusal::EmptyPrompt)
        );
        assert!(matches!(
            session.submit(&"長".repeat(3_000)).await,
            SubmitOutcome::Refused(SubmitRefusal::InvalidPrompt { .. })
        ));
        session.set_project(None);
        assert_eq!(
            session.submit("valid").await,
            SubmitOutcome::Refused(SubmitRefusal::NoProject)
        );

        assert!(session.conversation().is_empty());
        assert!(session.generation_queue().is_empty());
        assert!(service.calls().is_empty());
    }

    struct RejectAll;

    impl PromptBuilder for RejectAll {
        fn build_prompt(&self, user_text: &str, _selections: &StructuredSelections) -> String {
            user_text.to_string()
        }

        fn validate_prompt(&self, _text: &str) -> PromptValidation {
            PromptValidation::invalid("no")
        }
    }

    #[tokio::test]
    async fn test_custom_prompt_builder_is_consulted() {
        let service = Arc::new(FakeService::default());
        let session = session_with(Arc::clone(&service)).with_prompt_builder(Arc::new(RejectAll));
        let outcome = session.submit("anything").await;
        assert_eq!(
            outcome,
            SubmitOutcome::Refused(SubmitRefusal::InvalidPrompt {
                suggestion: Some("no".to_string())
            })
        );
    }

    #[tokio::test]
    async fn test_selections_reach_request() {
        let service = Arc::new(FakeService::default());
        let session = session_with(Arc::clone(&service));
        session.select_option("clothing-theme", "SF");
        session.select_option("pose-composition", "上半身");

        session.submit("少女").await;
        let Call::Text(request) = &service.calls()[0] else {
            panic!("expected text-only call");
        };
        assert_eq!(request.tags.style, "sci-fi");
        assert_eq!(request.tags.camera, "upper-body");
        assert_eq!(request.tags.lighting, "natural");
        assert!(request.base_prompt.starts_with("少女, "));
        assert_eq!(session.conversation()[0].text.as_deref(), Some("少女"));

        session.clear_selections();
        session.submit("少女").await;
        let Call::Text(request) = &service.calls()[1] else {
            panic!("expected text-only call");
        };
        assert_eq!(request.base_prompt, "少女");
        assert_eq!(request.tags.style, "anime");
    }

    #[tokio::test]
    async fn test_settings_snapshot_is_isolated() {
        let gate = Arc::new(Notify::new());
        let service = Arc::new(FakeService::gated(Arc::clone(&gate)));
        let session = session_with(Arc::clone(&service));

        let pending = session.begin("snapshot").unwrap();
        session.set_settings(DetailedSettings {
            number_of_images: 4,
            ..DetailedSettings::default()
        });
        let task = tokio::spawn(pending.run());
        wait_until_started(&service, 1).await;
        gate.notify_one();
        task.await.unwrap();

        let Call::Text(request) = &service.calls()[0] else {
            panic!("expected text-only call");
        };
        assert_eq!(request.count, 1);
        assert_eq!(session.generation_queue()[0].settings.number_of_images, 1);
    }

    #[tokio::test]
    async fn test_regenerate_creates_new_job() {
        let service = Arc::new(FakeService::default());
        let session = session_with(Arc::clone(&service));
        session.submit("もう一度").await;
        let original = session.conversation()[0].clone();

        let outcome = session.regenerate(original.id).await;
        assert!(matches!(outcome, SubmitOutcome::Completed { .. }));

        let conversation = session.conversation();
        assert_eq!(conversation.len(), 4);
        assert_eq!(conversation[0], original);
        assert_eq!(conversation[2].text.as_deref(), Some("もう一度"));
        assert_ne!(conversation[2].metadata.job_id, original.metadata.job_id);
        assert_eq!(service.calls().len(), 2);

        assert_eq!(
            session.regenerate(MessageId::new()).await,
            SubmitOutcome::Refused(SubmitRefusal::UnknownMessage)
        );
    }

    #[tokio::test]
    async fn test_dropped_pending_resets_loading() {
        let service = Arc::new(FakeService::default());
        let session = session_with(Arc::clone(&service));
        let pending = session.begin("dropped").unwrap();
        assert!(session.is_loading());
        drop(pending);
        assert!(!session.is_loading());

        let response = &session.conversation()[1];
        assert_eq!(response.text.as_deref(), Some(FAILURE_TEXT));
        let error = response.metadata.error.as_ref().unwrap();
        assert_eq!(error.kind, ErrorKind::Service);
        assert_eq!(
            error.detail.as_deref(),
            Some(GenerationError::Interrupted.to_string().as_str())
        );
        assert_eq!(session.generation_queue()[0].state, JobState::Failed);
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_settings_follow_configured_limits() {
        let service = Arc::new(FakeService::default());
        let mut config = StudioConfig::new().with_project(ProjectId::new());
        config.limits.max_images = 2;
        config.limits.max_negative_prompt_chars = 10;
        let session = GenerationSession::new(&config, Arc::clone(&service) as Arc<dyn GenerationService>).unwrap();

        let applied = session.set_settings(DetailedSettings {
            number_of_images: 4,
            negative_prompt: Some("x".repeat(400)),
            ..DetailedSettings::default()
        });
        assert_eq!(applied.number_of_images, 2);
        assert_eq!(applied.negative_prompt.as_deref().map(str::len), Some(10));

        session.submit("制限付き").await;
        let Call::Text(request) = &service.calls()[0] else {
            panic!("expected text-only call");
        };
        assert_eq!(request.count, 2);
        assert_eq!(request.negative_prompt.as_deref().map(str::len), Some(10));
    }

    #[tokio::test]
    async fn test_clear_frees_archived_attachments() {
        let service = Arc::new(FakeService::default());
        let session = session_with(Arc::clone(&service));
        session.add_attachments(vec![payload("a.png")]);
        session.submit("添付あり").await;
        session.add_attachments(vec![payload("b.png")]);
        assert_eq!(session.arena().live_count(), 2);

        session.clear(false);
        assert_eq!(session.arena().live_count(), 1);
        assert_eq!(session.attachments().len(), 1);
        assert_eq!(session.get_stats().total_generations, 1);
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let service = Arc::new(FakeService::default());
        let session = session_with(Arc::clone(&service));
        session.set_settings(DetailedSettings {
            number_of_images: 3,
            ..DetailedSettings::default()
        });
        session.submit("a").await;
        session.submit("b").await;

        let stats = session.get_stats();
        assert_eq!(stats.total_generations, 2);
        assert_eq!(stats.total_images, 6);
        assert_eq!(stats.current_queue_depth, 0);

        session.clear(false);
        assert!(session.conversation().is_empty());
        assert_eq!(session.get_stats().total_generations, 2);
        session.clear(true);
        assert_eq!(session.get_stats().total_generations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_ticks_are_bounded() {
        let gate = Arc::new(Notify::new());
        let service = Arc::new(FakeService::gated(Arc::clone(&gate)));
        let session = session_with(Arc::clone(&service));

        let pending = session.begin("slow").unwrap();
        let job_id = pending.job_id();
        let task = tokio::spawn(pending.run());
        assert_eq!(session.generation_queue()[0].progress, None);

        let mut previous = 0.0_f32;
        for _ in 0..30 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let job = session
                .generation_queue()
                .into_iter()
                .find(|job| job.id == job_id)
                .unwrap();
            let progress = job.progress.unwrap_or(0.0);
            assert!(progress >= previous);
            assert!(progress <= 95.0);
            previous = progress;
        }
        assert!((previous - 95.0).abs() < f32::EPSILON);

        gate.notify_one();
        task.await.unwrap();
        assert_eq!(session.generation_queue()[0].progress, Some(100.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_job_removed_after_grace_window() {
        let service = Arc::new(FakeService::default());
        let session = session_with(Arc::clone(&service));

        session.submit("cleanup").await;
        let conversation = session.conversation();
        assert_eq!(session.generation_queue().len(), 1);

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(session.generation_queue().len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(session.generation_queue().is_empty());
        assert_eq!(session.conversation(), conversation);
    }
}
