//! Training: background indexing of approved sources into the slide index.

pub mod coordinator;
pub mod progress;

pub use coordinator::{SourceError, TrainingCoordinator, TrainingStatus};
pub use progress::{TrainingBroadcaster, TrainingPhase, TrainingProgressEvent};
