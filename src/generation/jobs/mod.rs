//! Job creation, progress, cancellation, and tracking.

pub mod cancellation;
pub mod factory;
pub mod progress;
pub mod registry;

pub use cancellation::CancellationController;
pub use factory::JobFactory;
pub use progress::{ProgressEstimator, estimate_progress};
pub use registry::JobRegistry;
