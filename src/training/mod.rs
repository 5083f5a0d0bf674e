//! Training loop: repeated search episodes driving the learning agent.

mod metrics;
mod trainer;

pub use metrics::{EpochRecord, RewardStats};
pub use trainer::{Trainer, TrainerConfig, TrainingReport};
