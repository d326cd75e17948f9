//! Aggregate statistics over the generation history.

use serde::{Deserialize, Serialize};

use crate::generation::core::message::Message;

/// Read-only summary shown next to the conversation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStats {
    /// Successful generations recorded in history.
    pub total_generations: usize,
    /// Images across those generations.
    pub total_images: usize,
    /// Mean generation time in seconds; 0 without history.
    pub avg_generation_time_seconds: f64,
    /// Jobs still generating.
    pub current_queue_depth: usize,
}

impl GenerationStats {
    /// Aggregate `history` and the current queue depth.
    #[must_use]
    pub fn compute(history: &[Message], current_queue_depth: usize) -> Self {
        let total_images = history.iter().map(|message| message.images.len()).sum();
        let timings: Vec<u64> = history
            .iter()
            .filter_map(|message| message.metadata.generation_time_ms)
            .collect();
        let avg_generation_time_seconds = if timings.is_empty() {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let mean_ms = timings.iter().sum::<u64>() as f64 / timings.len() as f64;
            mean_ms / 1000.0
        };

        Self {
            total_generations: history.len(),
            total_images,
            avg_generation_time_seconds,
            current_queue_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::core::config::JobConfig;
    use crate::generation::core::settings::DetailedSettings;
    use crate::generation::jobs::factory::JobFactory;

    fn response(images: usize, ms: u64) -> Message {
        let job = JobFactory::new(&JobConfig::default())
            .create("p", &DetailedSettings::default())
            .unwrap();
        let urls = (0..images).map(|i| format!("https://cdn.example/{i}.png")).collect();
        Message::response(&job, urls, Vec::new(), ms)
    }

    #[test]
    fn test_empty_history() {
        let stats = GenerationStats::compute(&[], 0);
        assert_eq!(stats, GenerationStats::default());
    }

    #[test]
    fn test_aggregates() {
        let history = vec![response(2, 10_000), response(4, 20_000)];
        let stats = GenerationStats::compute(&history, 1);
        assert_eq!(stats.total_generations, 2);
        assert_eq!(stats.total_images, 6);
        assert!((stats.avg_generation_time_seconds - 15.0).abs() < f64::EPSILON);
        assert_eq!(stats.current_queue_depth, 1);
    }
}
