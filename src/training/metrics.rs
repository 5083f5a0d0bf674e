/// Mean and population standard deviation of per-step rewards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl RewardStats {
    pub fn from_rewards(rewards: &[f64]) -> Self {
        if rewards.is_empty() {
            return RewardStats {
                mean: 0.0,
                std_dev: 0.0,
            };
        }
        let n = rewards.len() as f64;
        let mean = rewards.iter().sum::<f64>() / n;
        let variance = rewards.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        RewardStats {
            mean,
            std_dev: variance.sqrt(),
        }
    }
}

/// One row of the per-epoch reward history.
#[derive(Debug, Clone)]
pub struct EpochRecord {
    pub epoch: usize,
    pub mean_reward: f64,
    pub std_dev: f64,
    pub steps: usize,
    pub seconds: f64,
}
