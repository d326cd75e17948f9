//! In-memory registry of active and recently settled jobs.

use tokio::task::AbortHandle;

use crate::generation::core::ids::JobId;
use crate::generation::core::job::{GenerationJob, JobState};

/// A job plus the timers it owns.
#[derive(Debug)]
struct JobEntry {
    job: GenerationJob,
    progress_timer: Option<AbortHandle>,
    cleanup_timer: Option<AbortHandle>,
}

impl Drop for JobEntry {
    fn drop(&mut self) {
        if let Some(timer) = self.progress_timer.take() {
            timer.abort();
        }
        if let Some(timer) = self.cleanup_timer.take() {
            timer.abort();
        }
    }
}

/// Insertion-ordered job registry.
///
/// Holds at most one generating job plus any settled jobs still inside
/// their cleanup grace window.
#[derive(Debug, Default)]
pub struct JobRegistry {
    entries: Vec<JobEntry>,
}

impl JobRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Track a new job.
    pub fn insert(&mut self, job: GenerationJob) {
        self.entries.push(JobEntry {
            job,
            progress_timer: None,
            cleanup_timer: None,
        });
    }

    fn entry_mut(&mut self, id: JobId) -> Option<&mut JobEntry> {
        self.entries.iter_mut().find(|entry| entry.job.id == id)
    }

    /// Mutably borrow a job.
    pub fn get_mut(&mut self, id: JobId) -> Option<&mut GenerationJob> {
        self.entry_mut(id).map(|entry| &mut entry.job)
    }

    /// Attach the progress ticker of a job.
    pub fn attach_progress_timer(&mut self, id: JobId, timer: AbortHandle) {
        match self.entry_mut(id) {
            Some(entry) => {
                if let Some(previous) = entry.progress_timer.replace(timer) {
                    previous.abort();
                }
            }
            None => timer.abort(),
        }
    }

    /// Stop the progress ticker of a job.
    pub fn stop_progress_timer(&mut self, id: JobId) {
        if let Some(timer) = self.entry_mut(id).and_then(|entry| entry.progress_timer.take()) {
            timer.abort();
        }
    }

    /// Attach the delayed-removal timer of a settled job.
    pub fn attach_cleanup_timer(&mut self, id: JobId, timer: AbortHandle) {
        match self.entry_mut(id) {
            Some(entry) => {
                if let Some(previous) = entry.cleanup_timer.replace(timer) {
                    previous.abort();
                }
            }
            None => timer.abort(),
        }
    }

    /// Remove a job, aborting its timers.
    pub fn remove(&mut self, id: JobId) -> Option<GenerationJob> {
        let index = self.entries.iter().position(|entry| entry.job.id == id)?;
        let entry = self.entries.remove(index);
        Some(entry.job.clone())
    }

    /// Snapshot of every tracked job in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<GenerationJob> {
        self.entries.iter().map(|entry| entry.job.clone()).collect()
    }

    /// Whether any job is still generating.
    #[must_use]
    pub fn has_generating(&self) -> bool {
        self.generating_count() > 0
    }

    /// Number of jobs still generating.
    #[must_use]
    pub fn generating_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.job.state == JobState::Generating)
            .count()
    }

    /// Number of tracked jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::generation::core::config::JobConfig;
    use crate::generation::core::job::JobEvent;
    use crate::generation::core::settings::DetailedSettings;
    use crate::generation::jobs::factory::JobFactory;

    fn job() -> GenerationJob {
        JobFactory::new(&JobConfig::default())
            .create("prompt", &DetailedSettings::default())
            .unwrap()
    }

    #[test]
    fn test_insert_and_remove() {
        let mut registry = JobRegistry::new();
        let job = job();
        let id = job.id;
        registry.insert(job);
        assert_eq!(registry.len(), 1);
        assert!(registry.has_generating());
        assert_eq!(registry.remove(id).map(|removed| removed.id), Some(id));
        assert!(registry.is_empty());
        assert!(registry.remove(id).is_none());
    }

    #[test]
    fn test_generating_count_ignores_settled_jobs() {
        let mut registry = JobRegistry::new();
        let first = job();
        let first_id = first.id;
        registry.insert(first);
        registry.insert(job());
        registry
            .get_mut(first_id)
            .unwrap()
            .apply(JobEvent::Fail, Utc::now())
            .unwrap();
        assert_eq!(registry.generating_count(), 1);
        assert_eq!(registry.snapshot()[0].state, JobState::Failed);
    }

    #[tokio::test]
    async fn test_remove_aborts_timers() {
        let mut registry = JobRegistry::new();
        let job = job();
        let id = job.id;
        registry.insert(job);
        let task = tokio::spawn(tokio::time::sleep(Duration::from_secs(3600)));
        registry.attach_progress_timer(id, task.abort_handle());
        registry.remove(id);
        assert!(task.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_timer_for_unknown_job_is_aborted() {
        let mut registry = JobRegistry::new();
        let task = tokio::spawn(tokio::time::sleep(Duration::from_secs(3600)));
        registry.attach_cleanup_timer(JobId::new(), task.abort_handle());
        assert!(task.await.unwrap_err().is_cancelled());
    }
}
